use model::Category;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::Result;

/// The `.bin`/`.idx`/`.info` triplet of one managed dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub data: PathBuf,
    pub index: PathBuf,
    pub info: PathBuf,
}

impl StorePaths {
    /// Paths of the dataset called `stem` inside `dir`.
    pub fn from_stem<P: AsRef<Path>>(dir: P, stem: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            data: dir.join(format!("{stem}.bin")),
            index: dir.join(format!("{stem}.idx")),
            info: dir.join(format!("{stem}.info")),
        }
    }

    /// Paths of the conventional dataset for `category` inside `dir`
    /// (`trees.*`, `buildings.*` or `prototypes.*`).
    pub fn for_category<P: AsRef<Path>>(dir: P, category: Category) -> Self {
        Self::from_stem(dir, category.file_stem())
    }

    fn all(&self) -> [&Path; 3] {
        [&self.data, &self.index, &self.info]
    }

    /// Returns `true` if all three files exist.
    pub fn exists(&self) -> bool {
        self.missing().is_none()
    }

    /// The first of the three files that does not exist, if any.
    pub fn missing(&self) -> Option<&Path> {
        self.all().into_iter().find(|p| !p.exists())
    }

    /// Creates whichever of the three files are missing as empty files,
    /// which is how an empty store looks on disk. Existing files are left
    /// untouched.
    pub fn create(&self) -> Result<()> {
        for path in self.all() {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn category_convention() {
        let paths = StorePaths::for_category("/data/wpvs", Category::Building);
        assert_eq!(paths.data, PathBuf::from("/data/wpvs/buildings.bin"));
        assert_eq!(paths.index, PathBuf::from("/data/wpvs/buildings.idx"));
        assert_eq!(paths.info, PathBuf::from("/data/wpvs/buildings.info"));
    }

    #[test]
    fn create_fills_in_missing_files() -> Result<()> {
        let dir = tempdir()?;
        let paths = StorePaths::from_stem(dir.path(), "city");
        assert_eq!(paths.missing(), Some(paths.data.as_path()));

        std::fs::write(&paths.index, b"keep")?;
        paths.create()?;
        assert!(paths.exists());
        assert_eq!(std::fs::read(&paths.index)?, b"keep");
        assert_eq!(std::fs::metadata(&paths.data)?.len(), 0);
        Ok(())
    }
}
