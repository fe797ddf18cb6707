//! # Index file
//!
//! Persistent map from a record id to the byte offset of that record in the
//! companion data file.
//!
//! ## File layout
//!
//! ```text
//! [cursor: u64 BE]                                     header, next free index offset
//! [id_len: i32 BE][id: UTF-8][data_offset: i64 BE]     repeated entry
//! ```
//!
//! Every entry is written exactly once, at the slot reserved for it when it
//! was added. Closing the index only writes the entries staged since the last
//! close and then rewrites the header, so the table is never rewritten as a
//! whole.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fs2::FileExt;
use model::codec::{read_string, string_size, write_string};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Size of the header in bytes.
pub const HEADER_BYTES: u64 = 8;

/// Returned by [`IndexFile::position_for_id`] for unknown ids.
pub const NOT_FOUND: i64 = -1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt index header in {0}")]
    CorruptHeader(PathBuf),
}

/// Location of one record, in the data file and in the index file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub data_position: u64,
    pub index_position: u64,
}

impl IndexEntry {
    /// Encoded size of the entry in the index file.
    pub fn encoded_size(&self) -> u64 {
        entry_size(&self.id)
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_size() as usize);
        write_string(&mut buf, &self.id)?;
        buf.write_i64::<BigEndian>(self.data_position as i64)?;
        Ok(buf)
    }
}

fn entry_size(id: &str) -> u64 {
    (string_size(id) + 8) as u64
}

#[derive(Debug)]
struct IndexState {
    entries: HashMap<String, IndexEntry>,
    /// Entries added since the last successful close, in reservation order.
    staged: Vec<IndexEntry>,
    cursor: u64,
}

/// An id → data offset index backed by a single file.
///
/// All lookups are served from memory. The in-memory state sits behind a
/// mutex, so an `IndexFile` can be shared between readers; at most one
/// [`close`](IndexFile::close) should be in flight per file.
#[derive(Debug)]
pub struct IndexFile {
    path: PathBuf,
    state: Mutex<IndexState>,
}

impl IndexFile {
    /// Opens the index at `path`, loading every entry into memory.
    ///
    /// A missing or empty file yields an empty index. Otherwise the header is
    /// read, followed by entries until the end of the file. A trailing entry
    /// cut short by a crash is ignored with a warning. The cursor resumes
    /// right after the last complete entry, even when the header disagrees
    /// (it was not rewritten after the last write), so complete entries are
    /// never overwritten and a torn tail is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or is shorter
    /// than its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if len == 0 {
            debug!(path = %path.display(), "opened new index");
            return Ok(Self::empty(path));
        }
        if len < HEADER_BYTES {
            return Err(IndexError::CorruptHeader(path));
        }

        let mut file = File::open(&path)?;
        FileExt::lock_shared(&file)?;
        let mut bytes = Vec::with_capacity(len as usize);
        let read = file.read_to_end(&mut bytes);
        FileExt::unlock(&file)?;
        read?;

        let mut input = bytes.as_slice();
        let header_cursor = input.read_u64::<BigEndian>()?;

        let mut entries = HashMap::new();
        let mut pos = HEADER_BYTES;
        while !input.is_empty() {
            let mut probe = input;
            let decoded = read_string(&mut probe)
                .and_then(|id| probe.read_i64::<BigEndian>().map(|offset| (id, offset)));
            let (id, data_position) = match decoded {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        offset = pos,
                        error = %e,
                        "ignoring truncated index tail"
                    );
                    break;
                }
            };
            let size = entry_size(&id);
            if entries.contains_key(&id) {
                warn!(
                    path = %path.display(),
                    id = %id,
                    "duplicate id in index, keeping first entry"
                );
            } else {
                entries.insert(
                    id.clone(),
                    IndexEntry {
                        id,
                        data_position: data_position as u64,
                        index_position: pos,
                    },
                );
            }
            pos += size;
            input = probe;
        }

        // entries are written before the header, so the scan is authoritative
        if pos != header_cursor {
            warn!(
                path = %path.display(),
                header = header_cursor,
                scanned = pos,
                "index header out of date, resuming after last entry"
            );
        }
        let cursor = pos;

        debug!(path = %path.display(), entries = entries.len(), cursor, "loaded index");
        Ok(Self {
            path,
            state: Mutex::new(IndexState {
                entries,
                staged: Vec::new(),
                cursor,
            }),
        })
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(IndexState {
                entries: HashMap::new(),
                staged: Vec::new(),
                cursor: HEADER_BYTES,
            }),
        }
    }

    /// Ensures `id` maps to `data_position`.
    ///
    /// If the id is already indexed nothing changes (the existing position is
    /// kept) and `true` is returned, since the id is present either way.
    /// Otherwise a slot is reserved at the index cursor and the entry is
    /// staged until the next [`close`](Self::close).
    pub fn add_id(&self, id: &str, data_position: u64) -> bool {
        let mut state = self.state.lock();
        if state.entries.contains_key(id) {
            debug!(id, "id already indexed");
            return true;
        }
        let entry = IndexEntry {
            id: id.to_string(),
            data_position,
            index_position: state.cursor,
        };
        state.cursor += entry.encoded_size();
        state.staged.push(entry.clone());
        state.entries.insert(entry.id.clone(), entry);
        true
    }

    /// Returns the data offset of `id`, or [`NOT_FOUND`].
    pub fn position_for_id(&self, id: &str) -> i64 {
        self.state
            .lock()
            .entries
            .get(id)
            .map_or(NOT_FOUND, |e| e.data_position as i64)
    }

    /// Returns the full entry for `id`, if indexed.
    pub fn entry(&self, id: &str) -> Option<IndexEntry> {
        self.state.lock().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    /// All data offsets, persisted and staged, in ascending order.
    pub fn positions(&self) -> Vec<u64> {
        let mut positions: Vec<u64> = self
            .state
            .lock()
            .entries
            .values()
            .map(|e| e.data_position)
            .collect();
        positions.sort_unstable();
        positions
    }

    /// All entries ordered by data offset.
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.state.lock().entries.values().cloned().collect();
        entries.sort_by_key(|e| e.data_position);
        entries
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Next free offset in the index file.
    pub fn cursor(&self) -> u64 {
        self.state.lock().cursor
    }

    /// Number of entries waiting for [`close`](Self::close).
    pub fn staged_len(&self) -> usize {
        self.state.lock().staged.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops every entry whose record would start at or after `data_end`,
    /// together with all entries stored after it, and cuts the file back to
    /// the first dropped slot. Returns the dropped ids, sorted.
    ///
    /// Used on open to forget entries whose records never reached the data
    /// file, so their offsets cannot be handed to another id.
    ///
    /// # Errors
    ///
    /// Any I/O failure while shortening the file is returned; the in-memory
    /// state is left unchanged in that case.
    pub fn discard_beyond(&self, data_end: u64) -> Result<Vec<String>, IndexError> {
        let mut state = self.state.lock();
        let cut = state
            .entries
            .values()
            .filter(|e| e.data_position >= data_end)
            .map(|e| e.index_position)
            .min();
        let Some(cut) = cut else {
            return Ok(Vec::new());
        };

        if self.path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            FileExt::lock_exclusive(&file)?;
            let shortened = truncate_to(&file, cut);
            FileExt::unlock(&file)?;
            shortened?;
        }

        let mut dropped: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.index_position >= cut)
            .map(|e| e.id.clone())
            .collect();
        dropped.sort_unstable();
        for id in &dropped {
            state.entries.remove(id);
        }
        state.staged.retain(|e| e.index_position < cut);
        state.cursor = cut;

        warn!(
            path = %self.path.display(),
            data_end,
            dropped = dropped.len(),
            cursor = cut,
            "discarded index entries past end of data file"
        );
        Ok(dropped)
    }

    /// Writes all staged entries and the header to disk.
    ///
    /// Does nothing if no entry was added since the last close; existing
    /// content is never rewritten. Otherwise the file is created if needed
    /// and held under an exclusive lock while every staged entry is written
    /// at its reserved offset, followed by the header cursor.
    ///
    /// # Errors
    ///
    /// Any I/O failure is returned. Entries stay staged, but bytes already
    /// written are not rolled back.
    pub fn close(&self) -> Result<(), IndexError> {
        let mut state = self.state.lock();
        if state.staged.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        let written = write_staged(&mut file, &state.staged, state.cursor);
        FileExt::unlock(&file)?;
        written?;

        debug!(
            path = %self.path.display(),
            entries = state.staged.len(),
            cursor = state.cursor,
            "flushed index"
        );
        state.staged.clear();
        Ok(())
    }
}

fn write_staged(file: &mut File, staged: &[IndexEntry], cursor: u64) -> io::Result<()> {
    for entry in staged {
        file.seek(SeekFrom::Start(entry.index_position))?;
        file.write_all(&entry.encode()?)?;
    }
    file.seek(SeekFrom::Start(0))?;
    file.write_u64::<BigEndian>(cursor)?;
    file.flush()?;
    file.sync_all()
}

fn truncate_to(mut file: &File, cursor: u64) -> io::Result<()> {
    file.set_len(cursor)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_u64::<BigEndian>(cursor)?;
    file.flush()?;
    file.sync_all()
}
