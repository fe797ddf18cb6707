//! Dataset metadata kept next to every model file.
//!
//! ```text
//! [ordinates: i32 BE][texture ordinates: i32 BE]
//! [min x, y, z: f64 BE][max x, y, z: f64 BE]      only if an envelope is known
//! [crs: string]                                   optional
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use model::codec::{read_string, write_string};
use model::{merge_into, Envelope};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::{Result, StoreError};

const COUNTERS_BYTES: usize = 8;
const ENVELOPE_BYTES: usize = 6 * 8;

/// Ordinate counters and dataset envelope of one model file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendInfo {
    ordinate_count: i32,
    texture_ordinate_count: i32,
    dataset_envelope: Option<Envelope>,
}

impl BackendInfo {
    /// Reads the info file at `path`. A missing or empty file yields the
    /// default (no ordinates, no envelope).
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Self::decode(&bytes).ok_or_else(|| StoreError::CorruptInfo(path.to_path_buf()))
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < COUNTERS_BYTES {
            return None;
        }
        let mut input = bytes;
        let ordinate_count = input.read_i32::<BigEndian>().ok()?;
        let texture_ordinate_count = input.read_i32::<BigEndian>().ok()?;

        let dataset_envelope = if input.is_empty() {
            None
        } else {
            if input.len() < ENVELOPE_BYTES {
                return None;
            }
            let mut corners = [0f64; 6];
            for v in &mut corners {
                *v = input.read_f64::<BigEndian>().ok()?;
            }
            let crs = if input.is_empty() {
                None
            } else {
                Some(read_string(&mut input).ok()?)
            };
            Some(Envelope::new(
                [corners[0], corners[1], corners[2]],
                [corners[3], corners[4], corners[5]],
                crs,
            ))
        };

        Some(Self {
            ordinate_count,
            texture_ordinate_count,
            dataset_envelope,
        })
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(COUNTERS_BYTES + ENVELOPE_BYTES);
        buf.write_i32::<BigEndian>(self.ordinate_count)?;
        buf.write_i32::<BigEndian>(self.texture_ordinate_count)?;
        if let Some(env) = &self.dataset_envelope {
            for v in env.min.iter().chain(env.max.iter()) {
                buf.write_f64::<BigEndian>(*v)?;
            }
            if let Some(crs) = &env.crs {
                write_string(&mut buf, crs)?;
            }
        }
        Ok(buf)
    }

    /// Replaces the info file at `path`.
    ///
    /// The new content goes to `<path>.tmp` first, is synced, and is then
    /// renamed over the old file, so readers see either version in full.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("info.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&self.encode()?)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        debug!(
            path = %path.display(),
            ordinates = self.ordinate_count,
            texture_ordinates = self.texture_ordinate_count,
            "wrote info file"
        );
        Ok(())
    }

    pub fn add_ordinates(&mut self, count: i32) {
        self.ordinate_count = self.ordinate_count.saturating_add(count);
    }

    pub fn add_texture_ordinates(&mut self, count: i32) {
        self.texture_ordinate_count = self.texture_ordinate_count.saturating_add(count);
    }

    /// Grows the dataset envelope to include `env`.
    pub fn merge_envelope(&mut self, env: Option<&Envelope>) {
        self.dataset_envelope = merge_into(self.dataset_envelope.take(), env);
    }

    pub fn set_dataset_envelope(&mut self, env: Envelope) {
        self.dataset_envelope = Some(env);
    }

    pub fn ordinate_count(&self) -> i32 {
        self.ordinate_count
    }

    pub fn texture_ordinate_count(&self) -> i32 {
        self.texture_ordinate_count
    }

    pub fn dataset_envelope(&self) -> Option<&Envelope> {
        self.dataset_envelope.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_and_empty_files_are_default() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("m.info");
        assert_eq!(BackendInfo::read(&path)?, BackendInfo::default());
        fs::write(&path, [])?;
        assert_eq!(BackendInfo::read(&path)?, BackendInfo::default());
        Ok(())
    }

    #[test]
    fn counters_only_layout() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("m.info");
        let mut info = BackendInfo::default();
        info.add_ordinates(12);
        info.add_texture_ordinates(6);
        info.write(&path)?;

        assert_eq!(fs::read(&path)?, vec![0, 0, 0, 12, 0, 0, 0, 6]);
        assert_eq!(BackendInfo::read(&path)?, info);
        Ok(())
    }

    #[test]
    fn envelope_with_and_without_crs() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("m.info");

        let mut info = BackendInfo::default();
        info.merge_envelope(Some(&Envelope::new([0.0; 3], [10.0; 3], None)));
        info.write(&path)?;
        assert_eq!(fs::metadata(&path)?.len(), 8 + 48);
        assert_eq!(BackendInfo::read(&path)?, info);

        info.set_dataset_envelope(Envelope::new(
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            Some("EPSG:31467".into()),
        ));
        info.write(&path)?;
        assert_eq!(fs::metadata(&path)?.len(), 8 + 48 + 4 + 10);
        let read = BackendInfo::read(&path)?;
        assert_eq!(read, info);
        assert_eq!(read.dataset_envelope().unwrap().crs.as_deref(), Some("EPSG:31467"));
        assert!(!dir.path().join("m.info.tmp").exists());
        Ok(())
    }

    #[test]
    fn merge_envelope_only_grows() {
        let mut info = BackendInfo::default();
        info.merge_envelope(None);
        assert!(info.dataset_envelope().is_none());
        info.merge_envelope(Some(&Envelope::new([0.0; 3], [1.0; 3], None)));
        info.merge_envelope(Some(&Envelope::new([0.5; 3], [0.6; 3], None)));
        info.merge_envelope(None);
        let env = info.dataset_envelope().unwrap();
        assert_eq!(env.min, [0.0; 3]);
        assert_eq!(env.max, [1.0; 3]);
    }

    #[test]
    fn truncated_envelope_is_corrupt() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("m.info");
        fs::write(&path, [0u8; 8 + 20])?;
        assert!(matches!(
            BackendInfo::read(&path),
            Err(StoreError::CorruptInfo(_))
        ));
        Ok(())
    }
}
