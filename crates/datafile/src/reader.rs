use anyhow::{Context, Result};
use fs2::FileExt;
use model::{merge_into, Envelope, ObjectSerializer, PositionableModel, Record};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use tracing::{debug, warn};

use crate::{DataFile, HEADER_BYTES};

impl<S: ObjectSerializer> DataFile<S> {
    /// Returns the record stored at `offset`.
    ///
    /// Records added or read earlier in this session are served from memory.
    /// Otherwise the file is opened read-only, a shared lock is taken on the
    /// whole file (not only the record's bytes), and the record is decoded at
    /// `offset` and cached. Shared locks never exclude each other, so
    /// concurrent `get` calls proceed in parallel; only a
    /// [`close`](Self::close) holding the exclusive lock blocks them. Returns `Ok(None)` when the
    /// offset lies outside the bytes on disk.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the bytes at `offset` do not
    /// decode as a record.
    pub fn get(&self, offset: u64) -> Result<Option<Record<S::Payload>>> {
        let persisted = {
            let state = self.state.lock();
            if let Some(record) = state.cache.get(&offset) {
                return Ok(Some(record.clone()));
            }
            state.persisted
        };
        if offset < HEADER_BYTES || offset >= persisted {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("open data file {}", self.path.display()))?;
        FileExt::lock_shared(&file)?;
        let decoded = self.read_at(&file, offset);
        FileExt::unlock(&file)?;
        let record = decoded.with_context(|| {
            format!(
                "decode record at offset {} of {}",
                offset,
                self.path.display()
            )
        })?;

        self.state.lock().cache.insert(offset, record.clone());
        Ok(Some(record))
    }

    fn read_at(&self, mut file: &File, offset: u64) -> std::io::Result<Record<S::Payload>> {
        file.seek(SeekFrom::Start(offset))?;
        let mut rdr = BufReader::new(file);
        self.serializer.read(&mut rdr)
    }

    /// Decodes every record in `range`, merging each record's envelope into
    /// `envelope`.
    ///
    /// The part of the range that is on disk is read into a single buffer
    /// under a shared lock and decoded front to back; the header is skipped
    /// when the range starts at `0`. Records added since the last close and
    /// reserved inside the range are taken from memory. The returned envelope
    /// carries `crs` when given.
    ///
    /// A record that fails to decode is logged and skipped: decoding resumes
    /// at the first offset in `boundaries` (ascending record offsets, usually
    /// from the index) past the failure, or the rest of the range is dropped
    /// when no such boundary is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, locked or read.
    pub fn read_all_from_file(
        &self,
        range: Range<u64>,
        boundaries: &[u64],
        envelope: Option<Envelope>,
        crs: Option<&str>,
    ) -> Result<(Option<Envelope>, Vec<Record<S::Payload>>)> {
        let (persisted, staged) = {
            let state = self.state.lock();
            let staged: Vec<_> = state
                .pending
                .range(range.clone())
                .map(|(_, r)| r.clone())
                .collect();
            (state.persisted, staged)
        };

        let mut envelope = envelope;
        let mut records = Vec::new();

        let start = range.start.max(HEADER_BYTES);
        let end = range.end.min(persisted);
        if start < end {
            let buf = self.read_range(start, end)?;
            let mut pos = start;
            while pos < end {
                let mut input = &buf[(pos - start) as usize..];
                let available = input.len();
                match self.serializer.read(&mut input) {
                    Ok(record) => {
                        pos += (available - input.len()) as u64;
                        envelope = merge_into(envelope, record.data.envelope().as_ref());
                        records.push(record);
                    }
                    Err(e) => {
                        let resume = boundaries.iter().copied().find(|b| *b > pos && *b < end);
                        warn!(
                            path = %self.path.display(),
                            offset = pos,
                            error = %e,
                            "skipping record that failed to decode"
                        );
                        match resume {
                            Some(next) => pos = next,
                            None => break,
                        }
                    }
                }
            }
        }

        for record in staged {
            envelope = merge_into(envelope, record.data.envelope().as_ref());
            records.push(record);
        }

        debug!(
            path = %self.path.display(),
            from = range.start,
            to = range.end,
            records = records.len(),
            "read batch"
        );
        Ok((envelope.map(|e| e.with_crs(crs)), records))
    }

    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("open data file {}", self.path.display()))?;
        FileExt::lock_shared(&file)?;
        let mut buf = vec![0u8; (end - start) as usize];
        let read = file
            .seek(SeekFrom::Start(start))
            .and_then(|_| file.read_exact(&mut buf));
        FileExt::unlock(&file)?;
        read.with_context(|| {
            format!(
                "read bytes {}..{} of {}",
                start,
                end,
                self.path.display()
            )
        })?;
        Ok(buf)
    }
}
