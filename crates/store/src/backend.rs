use model::{
    Billboard, BillboardSerializer, Category, ObjectSerializer, Record, WorldObject,
    WorldObjectSerializer,
};
use tracing::{debug, info, warn};

use crate::renderer::apply_domain;
use crate::{
    BackendInfo, ModelFile, RenderableSink, Result, StoreError, StoreOptions, StorePaths,
};

/// A payload of any category, as handed to [`FileBackend::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelObject {
    Tree(Billboard),
    Building(WorldObject),
    Prototype(WorldObject),
}

impl ModelObject {
    pub fn category(&self) -> Category {
        match self {
            ModelObject::Tree(_) => Category::Tree,
            ModelObject::Building(_) => Category::Building,
            ModelObject::Prototype(_) => Category::Prototype,
        }
    }
}

/// Counters returned by [`FileBackend::insert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendResult {
    pub insert_count: usize,
    pub update_count: usize,
    pub delete_count: usize,
    pub failed_count: usize,
}

/// A consumer for [`FileBackend::load_entities`], which picks the store to
/// load from by the kind of sink.
pub enum Renderer<'a> {
    Trees(&'a mut dyn RenderableSink<Billboard>),
    Buildings(&'a mut dyn RenderableSink<WorldObject>),
}

/// Up to three model files (trees, buildings, prototypes) behind one facade.
///
/// A backend is either a tree store ([`open_trees`](FileBackend::open_trees))
/// or a building store with optional prototypes
/// ([`open_buildings`](FileBackend::open_buildings)). Operations on a
/// category that is not open fail with [`StoreError::NotOpen`].
pub struct FileBackend {
    trees: Option<ModelFile<BillboardSerializer>>,
    buildings: Option<ModelFile<WorldObjectSerializer>>,
    prototypes: Option<ModelFile<WorldObjectSerializer>>,
}

fn require_existing(paths: &StorePaths) -> Result<()> {
    match paths.missing() {
        Some(path) => Err(StoreError::MissingStore(path.to_path_buf())),
        None => Ok(()),
    }
}

fn add_to<S: ObjectSerializer>(
    file: Option<&mut ModelFile<S>>,
    category: Category,
    record: Record<S::Payload>,
) -> Result<bool> {
    match file {
        Some(file) => file.add(record),
        None => Err(StoreError::NotOpen(category)),
    }
}

impl FileBackend {
    /// Opens a tree (billboard) store. All three files must already exist.
    pub fn open_trees(paths: &StorePaths, options: &StoreOptions) -> Result<Self> {
        require_existing(paths)?;
        let trees = ModelFile::open_paths(paths, BillboardSerializer, options)?;
        info!(path = %paths.data.display(), records = trees.len(), "opened tree store");
        Ok(Self {
            trees: Some(trees),
            buildings: None,
            prototypes: None,
        })
    }

    /// Opens a building store, which must already exist, and optionally a
    /// prototype store, whose files are created if they are missing.
    pub fn open_buildings(
        paths: &StorePaths,
        prototype_paths: Option<&StorePaths>,
        options: &StoreOptions,
    ) -> Result<Self> {
        require_existing(paths)?;
        let buildings = ModelFile::open_paths(paths, WorldObjectSerializer, options)?;
        info!(
            path = %paths.data.display(),
            records = buildings.len(),
            "opened building store"
        );

        let prototypes = match prototype_paths {
            Some(proto) => {
                if !proto.exists() {
                    debug!(path = %proto.data.display(), "creating prototype store");
                    proto.create()?;
                }
                Some(ModelFile::open_paths(proto, WorldObjectSerializer, options)?)
            }
            None => None,
        };

        Ok(Self {
            trees: None,
            buildings: Some(buildings),
            prototypes,
        })
    }

    /// Returns `true` for a tree store.
    pub fn is_billboard(&self) -> bool {
        self.trees.is_some()
    }

    /// Adds `records` to the store of `category`.
    ///
    /// Records whose id is already stored and records whose payload does not
    /// belong to `category` are skipped and counted as failed.
    ///
    /// # Errors
    ///
    /// Fails if `category` is not open or a data file cannot take a record.
    /// Records added before the failure stay added.
    pub fn insert(
        &mut self,
        records: Vec<Record<ModelObject>>,
        category: Category,
    ) -> Result<BackendResult> {
        let mut result = BackendResult::default();
        for record in records {
            let Record { id, time, data } = record;
            let added = match (category, data) {
                (Category::Tree, ModelObject::Tree(b)) => {
                    add_to(self.trees.as_mut(), category, Record::new(id, time, b))?
                }
                (Category::Building, ModelObject::Building(w)) => {
                    add_to(self.buildings.as_mut(), category, Record::new(id, time, w))?
                }
                (Category::Prototype, ModelObject::Prototype(w)) => {
                    add_to(self.prototypes.as_mut(), category, Record::new(id, time, w))?
                }
                (_, other) => {
                    warn!(
                        id = %id,
                        expected = %category,
                        found = %other.category(),
                        "skipping record of another category"
                    );
                    false
                }
            };
            if added {
                result.insert_count += 1;
            } else {
                result.failed_count += 1;
            }
        }
        debug!(
            category = %category,
            inserted = result.insert_count,
            failed = result.failed_count,
            "insert finished"
        );
        Ok(result)
    }

    /// Loads every tree into `renderer`.
    pub fn load_trees<R>(&mut self, renderer: &mut R, crs: Option<&str>) -> Result<()>
    where
        R: RenderableSink<Billboard> + ?Sized,
    {
        let trees = self
            .trees
            .as_mut()
            .ok_or(StoreError::NotOpen(Category::Tree))?;
        let (envelope, records) = trees.read_all_from_file(crs)?;
        apply_domain::<Billboard, _>(renderer, envelope);
        for record in records {
            renderer.add(record.into_identified());
        }
        Ok(())
    }

    /// Loads every building into `renderer`.
    pub fn load_buildings<R>(&mut self, renderer: &mut R, crs: Option<&str>) -> Result<()>
    where
        R: RenderableSink<WorldObject> + ?Sized,
    {
        let buildings = self
            .buildings
            .as_mut()
            .ok_or(StoreError::NotOpen(Category::Building))?;
        let (envelope, records) = buildings.read_all_from_file(crs)?;
        apply_domain::<WorldObject, _>(renderer, envelope);
        for record in records {
            renderer.add(record.into_identified());
        }
        Ok(())
    }

    /// Loads every prototype. Returns nothing if no prototype store is open.
    pub fn load_prototypes(&mut self, crs: Option<&str>) -> Result<Vec<WorldObject>> {
        let Some(prototypes) = self.prototypes.as_mut() else {
            return Ok(Vec::new());
        };
        let (_, records) = prototypes.read_all_from_file(crs)?;
        Ok(records.into_iter().map(Record::into_identified).collect())
    }

    /// Loads trees or buildings, depending on the kind of `renderer`.
    pub fn load_entities(&mut self, renderer: Renderer<'_>, crs: Option<&str>) -> Result<()> {
        match renderer {
            Renderer::Trees(sink) => self.load_trees(sink, crs),
            Renderer::Buildings(sink) => self.load_buildings(sink, crs),
        }
    }

    /// Looks up a single object by id.
    pub fn get_object(&self, category: Category, id: &str) -> Result<Option<ModelObject>> {
        let not_open = || StoreError::NotOpen(category);
        let object = match category {
            Category::Tree => self
                .trees
                .as_ref()
                .ok_or_else(not_open)?
                .get(id)?
                .map(|r| ModelObject::Tree(r.into_identified())),
            Category::Building => self
                .buildings
                .as_ref()
                .ok_or_else(not_open)?
                .get(id)?
                .map(|r| ModelObject::Building(r.into_identified())),
            Category::Prototype => self
                .prototypes
                .as_ref()
                .ok_or_else(not_open)?
                .get(id)?
                .map(|r| ModelObject::Prototype(r.into_identified())),
        };
        Ok(object)
    }

    /// Metadata of the store of `category`, if that store is open.
    pub fn backend_info(&self, category: Category) -> Option<&BackendInfo> {
        match category {
            Category::Tree => self.trees.as_ref().map(ModelFile::info),
            Category::Building => self.buildings.as_ref().map(ModelFile::info),
            Category::Prototype => self.prototypes.as_ref().map(ModelFile::info),
        }
    }

    /// Persists pending additions of every open store.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(trees) = self.trees.as_mut() {
            trees.close()?;
        }
        if let Some(buildings) = self.buildings.as_mut() {
            buildings.close()?;
        }
        if let Some(prototypes) = self.prototypes.as_mut() {
            prototypes.close()?;
        }
        Ok(())
    }

    pub fn delete(&mut self, _ids: &[&str], _category: Category) -> Result<BackendResult> {
        Err(StoreError::Unsupported("delete"))
    }

    pub fn update(
        &mut self,
        _records: Vec<Record<ModelObject>>,
        _category: Category,
    ) -> Result<BackendResult> {
        Err(StoreError::Unsupported("update"))
    }

    pub fn objects_for_sql(&self, _query: &str) -> Result<Vec<ModelObject>> {
        Err(StoreError::Unsupported("SQL queries"))
    }
}
