use crate::error::StoreError;
use crate::models::StorageEntry;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Rejects absolute paths and any `..` component; every store joins
/// caller-supplied names onto its root only after this check.
pub(crate) fn ensure_relative(relative: &str) -> Result<(), StoreError> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(StoreError::InvalidPath(relative.to_string()));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(StoreError::InvalidPath(relative.to_string())),
        }
    }
    Ok(())
}

/// File CRUD over the upload area. Relative paths may contain forward
/// slashes for subfolders; anything that would escape the root is rejected
/// before touching the filesystem.
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `relative` under the root, refusing absolute paths and any
    /// `..` component.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        ensure_relative(relative)?;
        Ok(self.root.join(relative))
    }

    pub fn save(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Single-level listing of one folder. Folders come before files, each
    /// group sorted by name; metadata sidecars are not listed.
    pub fn list(&self, folder: &str) -> Result<Vec<StorageEntry>, StoreError> {
        let dir = self.resolve(folder)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(folder.to_string()));
        }

        let mut folders = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(SIDECAR_SUFFIX) {
                continue;
            }

            let relative = if folder.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", folder.trim_end_matches('/'), name)
            };

            if entry.file_type()?.is_dir() {
                folders.push(StorageEntry {
                    name,
                    kind: "folder".to_string(),
                    size: None,
                    modified: None,
                    path: relative,
                });
            } else {
                let metadata = entry.metadata()?;
                let modified = metadata
                    .modified()
                    .ok()
                    .map(chrono::DateTime::<chrono::Utc>::from)
                    .map(|stamp| stamp.timestamp_millis());
                let kind = Path::new(&name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.to_ascii_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                files.push(StorageEntry {
                    name,
                    kind,
                    size: Some(metadata.len()),
                    modified,
                    path: relative,
                });
            }
        }

        folders.sort_by(|left, right| left.name.cmp(&right.name));
        files.sort_by(|left, right| left.name.cmp(&right.name));
        folders.extend(files);
        Ok(folders)
    }

    pub fn create_folder(&self, relative: &str) -> Result<(), StoreError> {
        let path = self.resolve(relative)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists(relative.to_string()));
        }
        fs::create_dir_all(path)?;
        Ok(())
    }

    pub fn rename_file(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let old_path = self.resolve(old)?;
        if !old_path.is_file() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        let new_path = self.resolve(new)?;
        if new_path.exists() {
            return Err(StoreError::AlreadyExists(new.to_string()));
        }

        fs::rename(&old_path, &new_path)?;
        self.move_sidecar(&old_path, &new_path)?;
        Ok(())
    }

    pub fn rename_folder(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let old_path = self.resolve(old)?;
        if !old_path.is_dir() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        let new_path = self.resolve(new)?;
        if new_path.exists() {
            return Err(StoreError::AlreadyExists(new.to_string()));
        }
        fs::rename(old_path, new_path)?;
        Ok(())
    }

    pub fn delete_file(&self, relative: &str) -> Result<(), StoreError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        fs::remove_file(&path)?;

        let sidecar = sidecar_path(&path);
        if sidecar.exists() {
            fs::remove_file(sidecar)?;
        }
        Ok(())
    }

    pub fn delete_folder(&self, relative: &str) -> Result<(), StoreError> {
        let path = self.resolve(relative)?;
        if relative.is_empty() {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        if !path.is_dir() {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Best-effort deletion: one status per requested path, failures do not
    /// stop the rest of the batch.
    pub fn bulk_delete(&self, relatives: &[String]) -> Vec<(String, Result<(), StoreError>)> {
        relatives
            .iter()
            .map(|relative| (relative.clone(), self.delete_file(relative)))
            .collect()
    }

    pub fn move_file(&self, relative: &str, destination_folder: &str) -> Result<(), StoreError> {
        let source = self.resolve(relative)?;
        if !source.is_file() {
            return Err(StoreError::NotFound(relative.to_string()));
        }

        let filename = source
            .file_name()
            .ok_or_else(|| StoreError::InvalidPath(relative.to_string()))?
            .to_string_lossy()
            .to_string();

        let folder = self.resolve(destination_folder.trim_start_matches('/'))?;
        fs::create_dir_all(&folder)?;
        let target = folder.join(&filename);
        if target.exists() {
            return Err(StoreError::AlreadyExists(filename));
        }

        fs::rename(&source, &target)?;
        self.move_sidecar(&source, &target)?;
        Ok(())
    }

    /// Zips the requested files into memory, preserving their relative
    /// paths as archive entry names. Missing files are skipped.
    pub fn bulk_download(&self, relatives: &[String]) -> Result<Vec<u8>, StoreError> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut archive = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();

            for relative in relatives {
                let path = self.resolve(relative)?;
                if !path.is_file() {
                    continue;
                }
                archive
                    .start_file(relative.as_str(), options)
                    .map_err(|error| StoreError::Zip(error.to_string()))?;
                archive.write_all(&fs::read(&path)?)?;
            }

            archive
                .finish()
                .map_err(|error| StoreError::Zip(error.to_string()))?;
        }
        Ok(buffer.into_inner())
    }

    fn move_sidecar(&self, old: &Path, new: &Path) -> Result<(), StoreError> {
        let old_sidecar = sidecar_path(old);
        if old_sidecar.exists() {
            fs::rename(old_sidecar, sidecar_path(new))?;
        }
        Ok(())
    }
}

fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}
