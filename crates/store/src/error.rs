use indexfile::IndexError;
use model::Category;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("data file error: {0:#}")]
    Data(#[from] anyhow::Error),
    #[error("corrupt info file {0}")]
    CorruptInfo(PathBuf),
    #[error("model store file {0} does not exist")]
    MissingStore(PathBuf),
    #[error("no {0} store is open")]
    NotOpen(Category),
    #[error("{0} is not supported by the file backend")]
    Unsupported(&'static str),
}
