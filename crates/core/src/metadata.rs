use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CLASSIFICATION: &str = "Unclassified";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    security_classification: String,
}

/// Sidecar metadata keyed by the uploaded file's name: `<file>.meta.json`
/// lives next to the file it describes.
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sidecar_path(&self, filename: &str) -> PathBuf {
        self.root.join(format!("{filename}.meta.json"))
    }

    /// Missing or unreadable sidecars degrade to the default label rather
    /// than failing the lookup.
    pub fn classification_for(&self, filename: &str) -> String {
        fs::read(self.sidecar_path(filename))
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Sidecar>(&bytes).ok())
            .map(|sidecar| sidecar.security_classification)
            .unwrap_or_else(|| DEFAULT_CLASSIFICATION.to_string())
    }

    pub fn set_classification(
        &self,
        filename: &str,
        classification: &str,
    ) -> Result<(), StoreError> {
        let sidecar = Sidecar {
            security_classification: classification.to_string(),
        };
        let body = serde_json::to_vec_pretty(&sidecar)
            .map_err(|error| StoreError::Malformed(error.to_string()))?;
        fs::write(self.sidecar_path(filename), body)?;
        Ok(())
    }
}
