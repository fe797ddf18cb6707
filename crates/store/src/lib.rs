//! # Store
//!
//! Model files and the file backend built on top of them.
//!
//! A [`ModelFile`] ties one [`IndexFile`](indexfile::IndexFile), one
//! [`DataFile`](datafile::DataFile) and a small [`BackendInfo`] record
//! together. It refuses duplicate ids, keeps the dataset envelope and ordinate
//! counters up to date, and bulk-loads the data file in byte-bounded batches.
//!
//! A [`FileBackend`] holds up to three model files, one per [`Category`]
//! (trees, buildings, prototypes), and dispatches inserts and loads between
//! them.
//!
//! Every managed dataset is a triplet of sibling files sharing a base name:
//!
//! ```text
//! <name>.bin    records
//! <name>.idx    id → record offset
//! <name>.info   ordinate counters and dataset envelope
//! ```
//!
//! Additions only change memory. Nothing reaches disk until
//! [`ModelFile::close`] or [`FileBackend::flush`].
//!
//! [`Category`]: model::Category

mod backend;
mod batch;
mod error;
mod info;
mod model_file;
mod paths;
mod renderer;

pub use backend::{BackendResult, FileBackend, ModelObject, Renderer};
pub use batch::{partition_batches, DEFAULT_BATCH_BYTES};
pub use error::{Result, StoreError};
pub use info::BackendInfo;
pub use model_file::ModelFile;
pub use paths::StorePaths;
pub use renderer::{CollectingRenderer, RenderableSink};

/// Tuning knobs shared by every model file of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Approximate number of data-file bytes decoded per bulk-read batch.
    pub batch_bytes: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            batch_bytes: DEFAULT_BATCH_BYTES,
        }
    }
}
