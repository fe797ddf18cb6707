/// A single managed dataset: index, data file and metadata.
use datafile::DataFile;
use indexfile::{IndexFile, NOT_FOUND};
use model::{Envelope, ObjectSerializer, PositionableModel, Record};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::batch::partition_batches;
use crate::{BackendInfo, Result, StoreOptions, StorePaths};

/// One dataset of records, stored as a `.bin`/`.idx`/`.info` triplet.
///
/// # Write Path
///
/// 1. Refuse the record if its id is already indexed (no updates).
/// 2. Reserve space for it in the [`DataFile`] and keep it in memory.
/// 3. Count its geometry ordinates, index its id, and grow the dataset
///    envelope by its bounding box.
///
/// Nothing is written until [`close`](ModelFile::close).
///
/// # Read Path
///
/// [`read_all_from_file`](ModelFile::read_all_from_file) takes every offset
/// from the index, splits the data file into batches of roughly
/// [`StoreOptions::batch_bytes`] and decodes them in ascending order, so no
/// more than one batch of raw bytes is held at a time.
pub struct ModelFile<S: ObjectSerializer> {
    index: IndexFile,
    data: DataFile<S>,
    info_path: PathBuf,
    info: BackendInfo,
    batch_bytes: u64,
}

impl<S: ObjectSerializer> ModelFile<S> {
    /// Combines an opened index and data file with the info file at
    /// `info_path`. A missing or empty info file yields empty metadata.
    ///
    /// Index entries pointing at or past the end of the data file (the index
    /// reached disk but the data did not) are discarded, so those ids can be
    /// added again and their offsets are never shared with another id.
    pub fn open<P: AsRef<Path>>(index: IndexFile, data: DataFile<S>, info_path: P) -> Result<Self> {
        let info_path = info_path.as_ref().to_path_buf();
        let info = BackendInfo::read(&info_path)?;
        let dropped = index.discard_beyond(data.size())?;
        if !dropped.is_empty() {
            warn!(
                path = %data.path().display(),
                ids = ?dropped,
                "forgetting indexed records missing from the data file"
            );
        }
        debug!(
            path = %info_path.display(),
            records = index.len(),
            envelope = info.dataset_envelope().is_some(),
            "opened model file"
        );
        Ok(Self {
            index,
            data,
            info_path,
            info,
            batch_bytes: StoreOptions::default().batch_bytes,
        })
    }

    /// Opens the triplet at `paths`, creating nothing on disk.
    pub fn open_paths(paths: &StorePaths, serializer: S, options: &StoreOptions) -> Result<Self> {
        let index = IndexFile::open(&paths.index)?;
        let data = DataFile::open(&paths.data, serializer)?;
        let mut file = Self::open(index, data, &paths.info)?;
        file.batch_bytes = options.batch_bytes;
        Ok(file)
    }

    /// Sets the approximate byte budget of one bulk-read batch.
    pub fn set_batch_bytes(&mut self, batch_bytes: u64) {
        self.batch_bytes = batch_bytes.max(1);
    }

    /// Adds `record` to the store.
    ///
    /// Returns `Ok(false)` without changing anything if a record with the
    /// same id is already stored; records are never updated in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the data file cannot reserve space for the record.
    pub fn add(&mut self, record: Record<S::Payload>) -> Result<bool> {
        if self.index.contains(&record.id) {
            warn!(
                id = %record.id,
                path = %self.info_path.display(),
                "record already stored, not updating"
            );
            return Ok(false);
        }

        let id = record.id.clone();
        let envelope = record.envelope();
        let ordinates = record.data.ordinate_count();
        let texture_ordinates = record.data.texture_ordinate_count();

        let offset = self.data.add(record)?;

        self.info.add_ordinates(ordinates as i32);
        self.info.add_texture_ordinates(texture_ordinates as i32);
        self.index.add_id(&id, offset);
        self.info.merge_envelope(envelope.as_ref());
        Ok(true)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.position_for_id(id) != NOT_FOUND
    }

    /// Looks up a single record by id.
    pub fn get(&self, id: &str) -> Result<Option<Record<S::Payload>>> {
        let position = self.index.position_for_id(id);
        if position == NOT_FOUND {
            return Ok(None);
        }
        Ok(self.data.get(position as u64)?)
    }

    /// Decodes every record of the store in batches, returning them with the
    /// envelope of everything read.
    ///
    /// The envelope carries `crs`. If the store had no dataset envelope
    /// yet (it was written before envelopes were tracked) and holds at least
    /// one record, the envelope computed while reading is written to the info
    /// file.
    pub fn read_all_from_file(
        &mut self,
        crs: Option<&str>,
    ) -> Result<(Option<Envelope>, Vec<Record<S::Payload>>)> {
        let offsets = self.index.positions();
        let total = self.data.size();
        let batches = partition_batches(&offsets, total, self.batch_bytes);

        let mut envelope = None;
        let mut records = Vec::with_capacity(offsets.len());
        for batch in batches {
            let first = offsets.partition_point(|o| *o < batch.start);
            let last = offsets.partition_point(|o| *o < batch.end);
            let (merged, mut decoded) =
                self.data
                    .read_all_from_file(batch, &offsets[first..last], envelope, crs)?;
            envelope = merged;
            records.append(&mut decoded);
        }

        if records.len() != offsets.len() {
            warn!(
                path = %self.data.path().display(),
                indexed = offsets.len(),
                decoded = records.len(),
                "bulk read did not return every indexed record"
            );
        }

        if self.info.dataset_envelope().is_none() && !records.is_empty() {
            if let Some(env) = &envelope {
                info!(path = %self.info_path.display(), "storing computed dataset envelope");
                self.info.set_dataset_envelope(env.clone());
                self.info.write(&self.info_path)?;
            }
        }
        Ok((envelope, records))
    }

    /// Persists everything added since the last close: the index first, then
    /// the data file, then the metadata (only once geometry ordinates have
    /// been recorded).
    pub fn close(&mut self) -> Result<()> {
        self.index.close()?;
        self.data.close()?;
        if self.info.ordinate_count() > 0 {
            self.info.write(&self.info_path)?;
        }
        Ok(())
    }

    pub fn info(&self) -> &BackendInfo {
        &self.info
    }

    pub fn index(&self) -> &IndexFile {
        &self.index
    }

    pub fn data(&self) -> &DataFile<S> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafile::HEADER_BYTES;
    use model::{Billboard, BillboardSerializer, Geometry, WorldObject, WorldObjectSerializer};
    use std::fs;
    use tempfile::tempdir;

    // ---------------------- Helpers ----------------------

    fn building(id: &str, min: [f64; 3], max: [f64; 3]) -> Record<WorldObject> {
        let obj = WorldObject::new(format!("{id} house"), Envelope::new(min, max, None))
            .with_geometry(Geometry {
                texture: "facade.png".into(),
                ordinates: vec![0.0; 9],
                texture_ordinates: vec![0.0; 6],
            });
        Record::new(id, 1000, obj)
    }

    fn open_buildings(dir: &Path) -> Result<ModelFile<WorldObjectSerializer>> {
        let paths = StorePaths::from_stem(dir, "buildings");
        ModelFile::open_paths(&paths, WorldObjectSerializer, &StoreOptions::default())
    }

    fn open_trees(dir: &Path) -> Result<ModelFile<BillboardSerializer>> {
        let paths = StorePaths::from_stem(dir, "trees");
        ModelFile::open_paths(&paths, BillboardSerializer, &StoreOptions::default())
    }

    fn tree(id: &str, x: f32) -> Record<Billboard> {
        Record::new(id, 5, Billboard::new([x, x, 0.0], 2.0, 4.0, "lime"))
    }

    // ---------------------- Scenario ----------------------

    #[test]
    fn add_close_reopen_read_all() -> Result<()> {
        let dir = tempdir()?;

        {
            let mut store = open_buildings(dir.path())?;
            assert!(store.add(building("b1", [0.0; 3], [10.0; 3]))?);
            assert_eq!(store.index().position_for_id("b1"), HEADER_BYTES as i64);
            store.close()?;
        }

        let mut store = open_buildings(dir.path())?;
        let (_, records) = store.read_all_from_file(None)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "b1");
        assert_eq!(records[0].time, 1000);
        let env = store.info().dataset_envelope().unwrap();
        assert_eq!(env.min, [0.0; 3]);
        assert_eq!(env.max, [10.0; 3]);

        assert!(!store.add(building("b1", [50.0; 3], [60.0; 3]))?);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn round_trip_by_position() -> Result<()> {
        let dir = tempdir()?;
        let original = building("r1", [1.0, 2.0, 3.0], [4.0, 5.0, 6.0]);
        {
            let mut store = open_buildings(dir.path())?;
            store.add(original.clone())?;
            store.close()?;
        }
        let store = open_buildings(dir.path())?;
        let position = store.index().position_for_id("r1");
        let read = store.data().get(position as u64)?.unwrap();
        assert_eq!(read, original);
        assert_eq!(store.get("r1")?, Some(original));
        Ok(())
    }

    // ---------------------- Duplicates / unknown ids ----------------------

    #[test]
    fn duplicate_id_is_refused_and_store_unchanged() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open_buildings(dir.path())?;
        let first = building("dup", [0.0; 3], [1.0; 3]);
        assert!(store.add(first.clone())?);
        let size = store.data().size();
        let ordinates = store.info().ordinate_count();

        assert!(!store.add(building("dup", [-100.0; 3], [100.0; 3]))?);
        assert_eq!(store.len(), 1);
        assert_eq!(store.data().size(), size);
        assert_eq!(store.info().ordinate_count(), ordinates);
        assert_eq!(store.info().dataset_envelope().unwrap().max, [1.0; 3]);
        assert_eq!(store.get("dup")?, Some(first));
        Ok(())
    }

    #[test]
    fn unknown_id() -> Result<()> {
        let dir = tempdir()?;
        let store = open_buildings(dir.path())?;
        assert_eq!(store.index().position_for_id("nonexistent"), -1);
        assert!(!store.contains("nonexistent"));
        assert!(store.get("nonexistent")?.is_none());
        Ok(())
    }

    // ---------------------- Envelope / counters ----------------------

    #[test]
    fn envelope_is_union_of_all_records() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open_buildings(dir.path())?;
        store.add(building("a", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]))?;
        store.add(building("b", [-3.0, 5.0, 0.0], [0.0, 6.0, 2.0]))?;
        store.add(building("c", [2.0, -1.0, -4.0], [9.0, 0.0, 0.0]))?;
        let env = store.info().dataset_envelope().unwrap();
        assert_eq!(env.min, [-3.0, -1.0, -4.0]);
        assert_eq!(env.max, [9.0, 6.0, 2.0]);
        Ok(())
    }

    #[test]
    fn ordinates_are_counted_and_persisted() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut store = open_buildings(dir.path())?;
            store.add(building("a", [0.0; 3], [1.0; 3]))?;
            store.add(building("b", [0.0; 3], [1.0; 3]))?;
            assert_eq!(store.info().ordinate_count(), 18);
            assert_eq!(store.info().texture_ordinate_count(), 12);
            store.close()?;
        }
        let store = open_buildings(dir.path())?;
        assert_eq!(store.info().ordinate_count(), 18);
        assert_eq!(store.info().texture_ordinate_count(), 12);
        assert_eq!(store.info().dataset_envelope().unwrap().max, [1.0; 3]);
        Ok(())
    }

    #[test]
    fn billboards_do_not_write_info_on_close() -> Result<()> {
        let dir = tempdir()?;
        let paths = StorePaths::from_stem(dir.path(), "trees");
        let mut store = open_trees(dir.path())?;
        store.add(tree("t1", 0.0))?;
        store.close()?;
        assert!(paths.data.exists());
        assert!(paths.index.exists());
        assert!(!paths.info.exists());
        Ok(())
    }

    #[test]
    fn legacy_store_envelope_is_upgraded_on_read() -> Result<()> {
        let dir = tempdir()?;
        let paths = StorePaths::from_stem(dir.path(), "trees");
        {
            let mut store = open_trees(dir.path())?;
            store.add(tree("t1", 0.0))?;
            store.add(tree("t2", 10.0))?;
            store.close()?;
        }

        let mut store = open_trees(dir.path())?;
        assert!(store.info().dataset_envelope().is_none());
        let (envelope, _) = store.read_all_from_file(Some("EPSG:25832"))?;
        assert!(paths.info.exists());

        let reopened = open_trees(dir.path())?;
        let env = reopened.info().dataset_envelope().unwrap();
        assert_eq!(env.min, [-1.0, -1.0, 0.0]);
        assert_eq!(env.max, [11.0, 11.0, 4.0]);
        assert_eq!(env.crs.as_deref(), Some("EPSG:25832"));
        assert_eq!(envelope.as_ref(), Some(env));
        Ok(())
    }

    #[test]
    fn empty_store_reads_nothing_and_writes_no_info() -> Result<()> {
        let dir = tempdir()?;
        let paths = StorePaths::from_stem(dir.path(), "trees");
        paths.create()?;
        let mut store = open_trees(dir.path())?;
        let (envelope, records) = store.read_all_from_file(None)?;
        assert!(envelope.is_none());
        assert!(records.is_empty());
        assert_eq!(fs::metadata(&paths.info)?.len(), 0);
        Ok(())
    }

    // ---------------------- Cursor integrity ----------------------

    #[test]
    fn cursor_is_header_plus_record_sizes() -> Result<()> {
        let dir = tempdir()?;
        let records: Vec<_> = (0..4)
            .map(|i| building(&format!("c{i}"), [i as f64; 3], [i as f64 + 1.0; 3]))
            .collect();
        let total: u64 = records
            .iter()
            .map(|r| WorldObjectSerializer.size_of(r) as u64)
            .sum();
        {
            let mut store = open_buildings(dir.path())?;
            for r in records {
                store.add(r)?;
            }
            store.close()?;
        }

        let mut store = open_buildings(dir.path())?;
        assert_eq!(store.data().size(), HEADER_BYTES + total);
        let bin = StorePaths::from_stem(dir.path(), "buildings").data;
        assert_eq!(fs::metadata(&bin)?.len(), HEADER_BYTES + total);

        store.add(building("next", [0.0; 3], [1.0; 3]))?;
        assert_eq!(store.index().position_for_id("next"), (HEADER_BYTES + total) as i64);
        Ok(())
    }

    #[test]
    fn index_flushed_without_data_is_discarded_on_reopen() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut store = open_buildings(dir.path())?;
            store.add(building("old", [0.0; 3], [1.0; 3]))?;
            // crash between the index and the data flush
            store.index().close()?;
        }

        {
            let mut store = open_buildings(dir.path())?;
            assert!(!store.contains("old"));
            assert!(store.get("old")?.is_none());
            assert!(store.add(building("new", [0.0; 3], [2.0; 3]))?);
            assert_eq!(store.index().position_for_id("new"), HEADER_BYTES as i64);
            store.close()?;
        }

        let store = open_buildings(dir.path())?;
        assert_eq!(store.len(), 1);
        assert!(store.get("old")?.is_none());
        assert_eq!(store.get("new")?.map(|r| r.id), Some("new".to_string()));
        Ok(())
    }

    #[test]
    fn dangling_id_can_be_added_again() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut store = open_buildings(dir.path())?;
            store.add(building("kept", [0.0; 3], [1.0; 3]))?;
            store.close()?;
            store.add(building("lost", [5.0; 3], [6.0; 3]))?;
            store.index().close()?;
        }

        let mut store = open_buildings(dir.path())?;
        assert_eq!(store.len(), 1);
        assert!(store.contains("kept"));
        assert!(store.add(building("lost", [5.0; 3], [6.0; 3]))?);
        store.close()?;

        let store = open_buildings(dir.path())?;
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("kept")?.map(|r| r.id), Some("kept".to_string()));
        assert_eq!(store.get("lost")?.map(|r| r.id), Some("lost".to_string()));
        Ok(())
    }

    // ---------------------- Batching ----------------------

    #[test]
    fn batched_reads_match_single_pass() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut store = open_trees(dir.path())?;
            for i in 0..50 {
                store.add(tree(&format!("t{i:02}"), i as f32))?;
            }
            store.close()?;
        }
        // a few records pending on top of the persisted ones
        let mut store = open_trees(dir.path())?;
        for i in 50..55 {
            store.add(tree(&format!("t{i:02}"), i as f32))?;
        }

        store.set_batch_bytes(u64::MAX);
        let single: Vec<String> = store
            .read_all_from_file(None)?
            .1
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(single.len(), 55);

        for step in [1, 7, 40, 100, 333, 1024] {
            store.set_batch_bytes(step);
            let batched: Vec<String> = store
                .read_all_from_file(None)?
                .1
                .into_iter()
                .map(|r| r.id)
                .collect();
            assert_eq!(batched, single, "step {step}");
        }
        Ok(())
    }
}
