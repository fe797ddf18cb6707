//! # Data file
//!
//! Append-only, offset-addressed storage for serialized records.
//!
//! Records are never moved or rewritten once placed. [`DataFile::add`] only
//! reserves a byte range at the write cursor and keeps the record in memory;
//! [`DataFile::close`] writes every pending record at its reserved offset and
//! then rewrites the header.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ HEADER (8 bytes)                             │
//! │ cursor (u64 BE), next free write offset      │
//! ├──────────────────────────────────────────────┤
//! │ RECORDS (back to back, no gaps)              │
//! │                                              │
//! │ id_len (i32) | id | time (i64) | payload     │
//! │                                              │
//! │ ... repeated for each record ...             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Payload length and shape are defined entirely by the
//! [`ObjectSerializer`] the file was opened with. All integers are big-endian.

mod format;
mod reader;
mod writer;

pub use format::{read_header, write_header, HEADER_BYTES};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use model::{ObjectSerializer, Record};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

struct DataState<P> {
    /// Next free write offset.
    cursor: u64,
    /// Length of the file as last seen on disk; `0` while the file is new.
    persisted: u64,
    /// Records added or read during this session, by offset.
    cache: HashMap<u64, Record<P>>,
    /// Records added since the last close, by offset.
    pending: BTreeMap<u64, Record<P>>,
}

/// An append-only record file.
///
/// The caches sit behind a mutex, so a `DataFile` can be shared between
/// readers. Reads from disk take a shared file lock and may overlap; a
/// [`close`](DataFile::close) takes an exclusive lock over the whole file.
pub struct DataFile<S: ObjectSerializer> {
    path: PathBuf,
    serializer: S,
    state: Mutex<DataState<S::Payload>>,
}

impl<S: ObjectSerializer> DataFile<S> {
    /// Opens the data file at `path`.
    ///
    /// A missing or empty file starts with the cursor right after the header.
    /// Otherwise only the header is read; records are decoded lazily. If the
    /// file is longer than the header claims (the header was not rewritten
    /// after the last write), the cursor is moved to the end of the file so
    /// those bytes are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is shorter
    /// than its header.
    pub fn open<P: AsRef<Path>>(path: P, serializer: S) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(e).with_context(|| format!("stat data file {}", path.display()))
            }
        };

        let (cursor, persisted) = if len == 0 {
            debug!(path = %path.display(), "opened new data file");
            (HEADER_BYTES, 0)
        } else {
            if len < HEADER_BYTES {
                bail!("data file {} is shorter than its header", path.display());
            }
            let mut file = File::open(&path)
                .with_context(|| format!("open data file {}", path.display()))?;
            FileExt::lock_shared(&file)?;
            let header = read_header(&mut file);
            FileExt::unlock(&file)?;
            let header = header?;

            if header < HEADER_BYTES {
                bail!("invalid cursor {} in data file {}", header, path.display());
            }
            let cursor = if len > header {
                warn!(
                    path = %path.display(),
                    header,
                    len,
                    "data header out of date, appending after end of file"
                );
                len
            } else {
                header
            };
            debug!(path = %path.display(), cursor, "opened data file");
            (cursor, len)
        };

        Ok(Self {
            path,
            serializer,
            state: Mutex::new(DataState {
                cursor,
                persisted,
                cache: HashMap::new(),
                pending: BTreeMap::new(),
            }),
        })
    }

    /// Reserves space for `record` at the write cursor and returns its offset.
    ///
    /// The record is kept in memory until the next [`close`](Self::close); it
    /// is immediately visible to [`get`](Self::get) and
    /// [`read_all_from_file`](Self::read_all_from_file).
    ///
    /// # Errors
    ///
    /// Fails if no byte range can be reserved for the record.
    pub fn add(&self, record: Record<S::Payload>) -> Result<u64> {
        let size = self.serializer.size_of(&record) as u64;
        if size == 0 {
            bail!("cannot reserve an empty range for record {}", record.id);
        }

        let mut state = self.state.lock();
        let offset = state.cursor;
        state.cursor = offset
            .checked_add(size)
            .with_context(|| format!("data file {} is full", self.path.display()))?;
        state.cache.insert(offset, record.clone());
        state.pending.insert(offset, record);
        Ok(offset)
    }

    /// Current write cursor, which is also the logical size of the file.
    pub fn size(&self) -> u64 {
        self.state.lock().cursor
    }

    /// Returns `true` if nothing of this file exists on disk yet.
    pub fn is_new(&self) -> bool {
        self.state.lock().persisted == 0
    }

    /// Number of records waiting for [`close`](Self::close).
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}
