use anyhow::{Context, Result};
use fs2::FileExt;
use model::{ObjectSerializer, Record};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use tracing::debug;

use crate::{write_header, DataFile};

impl<S: ObjectSerializer> DataFile<S> {
    /// Writes every pending record to disk, then rewrites the header.
    ///
    /// Does nothing if no record was added since the last close. Otherwise
    /// the file is created if needed and held under an exclusive lock while
    /// the records are written at their reserved offsets in ascending order.
    ///
    /// # Errors
    ///
    /// Any I/O failure is returned. Records stay pending, but bytes already
    /// written are not rolled back.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("open data file {} for writing", self.path.display()))?;
        FileExt::lock_exclusive(&file)?;
        let written = self.write_pending(&file, &state.pending, state.cursor);
        FileExt::unlock(&file)?;
        written.with_context(|| format!("write data file {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            records = state.pending.len(),
            cursor = state.cursor,
            "flushed data file"
        );
        state.persisted = state.cursor;
        state.pending.clear();
        Ok(())
    }

    fn write_pending(
        &self,
        file: &File,
        pending: &BTreeMap<u64, Record<S::Payload>>,
        cursor: u64,
    ) -> std::io::Result<()> {
        let mut w = BufWriter::new(file);
        let mut pos = None;
        for (offset, record) in pending {
            // pending ranges are contiguous, so this seeks once per close
            if pos != Some(*offset) {
                w.seek(SeekFrom::Start(*offset))?;
            }
            self.serializer.write(&mut w, record)?;
            pos = Some(offset + self.serializer.size_of(record) as u64);
        }
        write_header(&mut w, cursor)?;
        w.flush()?;
        drop(w);
        file.sync_all()
    }
}
