use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Paragraph,
    Sentence,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Paragraph => "paragraph",
            UnitKind::Sentence => "sentence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedUnit {
    pub text: String,
    pub source: String,
    pub security_classification: String,
    pub unit_type: UnitKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Success,
    NotFound,
    Error(String),
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Success => f.write_str("success"),
            FileStatus::NotFound => f.write_str("not_found"),
            FileStatus::Error(message) => write!(f, "error:{message}"),
        }
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub outcomes: Vec<FileOutcome>,
    pub units: Vec<ExtractedUnit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub question: String,
    pub answer: String,
    pub source: String,
    #[serde(rename = "security classification")]
    pub security_classification: String,
    #[serde(rename = "type")]
    pub unit_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "uploadDate", skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    pub path: String,
}
