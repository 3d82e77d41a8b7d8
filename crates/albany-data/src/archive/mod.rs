//! Macroeconomic indicator archive.
//!
//! The archive root holds one directory per indicator category (for example
//! `Economy & Growth/`), each a World Bank WDI bundle. See [`ArchiveCategory`]
//! for the bundle layout.

mod category;
mod selection;

pub use category::{ArchiveCategory, IndicatorSeries};
pub use selection::IndicatorSelection;

use crate::error::{DataError, Result};
use std::path::{Path, PathBuf};

/// An archive root and its category directories.
#[derive(Debug, Clone)]
pub struct IndicatorArchive {
    root: PathBuf,
    categories: Vec<PathBuf>,
}

impl IndicatorArchive {
    /// Scan `root` for category directories, sorted by name.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DataError::archive(
                root.display().to_string(),
                "archive root is not a directory",
            ));
        }

        let mut categories: Vec<PathBuf> = std::fs::read_dir(&root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        categories.sort();

        Ok(Self { root, categories })
    }

    /// Archive root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Category directories.
    pub fn categories(&self) -> &[PathBuf] {
        &self.categories
    }

    /// Load every category, pairing each directory with its parse result.
    pub fn load_all(&self) -> Vec<(PathBuf, Result<ArchiveCategory>)> {
        self.categories
            .iter()
            .map(|dir| (dir.clone(), ArchiveCategory::load(dir)))
            .collect()
    }
}
