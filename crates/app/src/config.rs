use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The flat-file data layout. Every subdirectory is created at startup so
/// handlers can assume it exists.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub uploads: PathBuf,
    pub extraction: PathBuf,
    pub datasets: PathBuf,
    pub models: PathBuf,
}

impl DataDirs {
    pub fn create(root: &Path) -> io::Result<Self> {
        let dirs = Self {
            uploads: root.join("uploads"),
            extraction: root.join("extraction"),
            datasets: root.join("datasets"),
            models: root.join("models"),
        };
        for dir in [&dirs.uploads, &dirs.extraction, &dirs.datasets, &dirs.models] {
            fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }
}
