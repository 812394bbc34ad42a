use crate::error::StoreError;
use crate::models::{ArtifactEntry, DatasetRow, ExtractedUnit};
use crate::storage::ensure_relative;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "question,answer,source,security classification,type";

/// Tabular artifacts over one directory. The directory listing is the only
/// index; nothing is cached between calls, so external modification is
/// visible on the next operation.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact names come from HTTP input; anything that would escape the
    /// store directory is rejected before the join.
    fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        ensure_relative(name)?;
        Ok(self.root.join(csv_name(name)))
    }

    /// Writes one artifact named `<destination>_<stamp>.csv`. The stamp is a
    /// flat numeric timestamp, incremented until the name is free so two
    /// writes in the same second never overwrite each other.
    pub fn write(&self, units: &[ExtractedUnit], destination: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root)?;

        let base = destination.trim().trim_end_matches(".csv");
        if base.is_empty() {
            return Err(StoreError::InvalidPath(destination.to_string()));
        }
        ensure_relative(base)?;

        let mut stamp: u64 = Utc::now()
            .format("%Y%m%d%H%M%S")
            .to_string()
            .parse()
            .unwrap_or_default();

        let path = loop {
            let candidate = self.root.join(format!("{base}_{stamp}.csv"));
            if !candidate.exists() {
                break candidate;
            }
            stamp += 1;
        };

        let mut body = String::from(CSV_HEADER);
        body.push('\n');
        for unit in units {
            // `question` stays empty at creation time; a reviewer fills it in.
            body.push_str(&format!(
                ",{},{},{},{}\n",
                escape_field(&unit.text),
                escape_field(&unit.source),
                escape_field(&unit.security_classification),
                unit.unit_type.as_str(),
            ));
        }

        fs::write(&path, body)?;
        Ok(path)
    }

    pub fn list(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".csv") || !entry.file_type()?.is_file() {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            entries.push(ArtifactEntry {
                name,
                created_at: DateTime::<Utc>::from(modified),
            });
        }

        entries.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(entries)
    }

    /// Parses up to `max_rows` data rows. Legacy four-column artifacts (no
    /// `type` column) parse with an empty unit type.
    pub fn preview(&self, name: &str, max_rows: usize) -> Result<Vec<DatasetRow>, StoreError> {
        let path = self.resolve(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let bytes = fs::read(&path)?;
        let contents = String::from_utf8(bytes)
            .map_err(|error| StoreError::Malformed(format!("{name}: {error}")))?;

        let mut records = parse_csv(&contents).into_iter();
        // Header row; artifacts are always written with one.
        records.next();

        let mut rows = Vec::new();
        for record in records.take(max_rows) {
            let mut fields = record.into_iter();
            rows.push(DatasetRow {
                question: fields.next().unwrap_or_default(),
                answer: fields.next().unwrap_or_default(),
                source: fields.next().unwrap_or_default(),
                security_classification: fields.next().unwrap_or_default(),
                unit_type: fields.next().unwrap_or_default(),
            });
        }

        Ok(rows)
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let old_path = self.resolve(old)?;
        let new_path = self.resolve(new)?;
        if !old_path.exists() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        if new_path.exists() {
            return Err(StoreError::AlreadyExists(new.to_string()));
        }

        fs::rename(old_path, new_path)?;
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Copies an artifact from another store into this one under the given
    /// dataset name, overwriting any previous promotion of the same name.
    pub fn promote(
        &self,
        source: &ArtifactStore,
        source_name: &str,
        dataset_name: &str,
    ) -> Result<PathBuf, StoreError> {
        let source_path = source.resolve(source_name)?;
        if !source_path.exists() {
            return Err(StoreError::NotFound(source_name.to_string()));
        }

        fs::create_dir_all(&self.root)?;
        let destination = self.resolve(dataset_name)?;
        fs::copy(source_path, &destination)?;
        Ok(destination)
    }
}

fn csv_name(name: &str) -> String {
    if name.ends_with(".csv") {
        name.to_string()
    } else {
        format!("{name}.csv")
    }
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, embedded
/// newlines. Enough for artifacts written here and the legacy variant.
fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitKind;
    use tempfile::tempdir;

    fn unit(text: &str, kind: UnitKind) -> ExtractedUnit {
        ExtractedUnit {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            security_classification: "Unclassified".to_string(),
            unit_type: kind,
        }
    }

    #[test]
    fn write_emits_the_fixed_header_and_empty_question_cells() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .write(&[unit("Some answer.", UnitKind::Paragraph)], "batch")
            .unwrap();

        let contents = fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(",Some answer.,doc.pdf,Unclassified,paragraph")
        );
    }

    #[test]
    fn same_second_writes_produce_distinct_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let units = [unit("Text.", UnitKind::Sentence)];

        let first = store.write(&units, "batch").unwrap();
        let second = store.write(&units, "batch").unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn preview_round_trips_fields_exactly() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let tricky = "Values, with \"quotes\" and, commas";
        let path = store
            .write(
                &[
                    unit(tricky, UnitKind::Paragraph),
                    unit("Plain sentence.", UnitKind::Sentence),
                ],
                "batch",
            )
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        let rows = store.preview(&name, 100).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.question.is_empty()));
        assert_eq!(rows[0].answer, tricky);
        assert_eq!(rows[0].source, "doc.pdf");
        assert_eq!(rows[0].security_classification, "Unclassified");
        assert_eq!(rows[0].unit_type, "paragraph");
        assert_eq!(rows[1].unit_type, "sentence");
    }

    #[test]
    fn preview_respects_the_row_limit() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let units: Vec<ExtractedUnit> = (0..10)
            .map(|i| unit(&format!("Row {i}."), UnitKind::Sentence))
            .collect();
        let path = store.write(&units, "batch").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert_eq!(store.preview(&name, 3).unwrap().len(), 3);
    }

    #[test]
    fn legacy_four_column_rows_parse_with_an_empty_type() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("legacy.csv"),
            "question,answer,source,security classification\n,Old text,doc.txt,Unclassified\n",
        )
        .unwrap();

        let store = ArtifactStore::new(dir.path());
        let rows = store.preview("legacy.csv", 10).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].answer, "Old text");
        assert_eq!(rows[0].unit_type, "");
    }

    #[test]
    fn preview_of_a_missing_artifact_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert!(matches!(
            store.preview("nope.csv", 5),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn rename_guards_both_endpoints() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .write(&[unit("Text.", UnitKind::Sentence)], "batch")
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(matches!(
            store.rename("ghost.csv", "other.csv"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.rename(&name, &name),
            Err(StoreError::AlreadyExists(_))
        ));

        store.rename(&name, "renamed.csv").unwrap();
        assert!(dir.path().join("renamed.csv").exists());
    }

    #[test]
    fn delete_removes_the_artifact_or_reports_not_found() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .write(&[unit("Text.", UnitKind::Sentence)], "batch")
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        store.delete(&name).unwrap();
        assert!(!path.exists());
        assert!(matches!(store.delete(&name), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn promote_copies_into_the_dataset_store() {
        let extraction_dir = tempdir().unwrap();
        let dataset_dir = tempdir().unwrap();
        let extraction = ArtifactStore::new(extraction_dir.path());
        let datasets = ArtifactStore::new(dataset_dir.path());

        let path = extraction
            .write(&[unit("Text.", UnitKind::Sentence)], "batch")
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        let promoted = datasets.promote(&extraction, &name, "my-dataset").unwrap();
        assert!(promoted.ends_with("my-dataset.csv"));
        assert!(promoted.exists());

        let rows = datasets.preview("my-dataset", 10).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn names_that_escape_the_store_are_rejected() {
        let root = tempdir().unwrap();
        let uploads = root.path().join("uploads");
        let datasets = root.path().join("datasets");
        fs::create_dir_all(&uploads).unwrap();
        fs::create_dir_all(&datasets).unwrap();
        fs::write(uploads.join("victim.csv"), "question,answer\n,kept\n").unwrap();

        let store = ArtifactStore::new(&datasets);
        let escape = "../uploads/victim.csv";

        assert!(matches!(
            store.delete(escape),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.preview(escape, 5),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.rename(escape, "stolen.csv"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.write(&[unit("Text.", UnitKind::Sentence)], "../uploads/victim"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.delete("/etc/passwd.csv"),
            Err(StoreError::InvalidPath(_))
        ));

        assert!(uploads.join("victim.csv").exists());
    }

    #[test]
    fn promote_refuses_escaping_names_on_both_sides() {
        let root = tempdir().unwrap();
        let extraction = ArtifactStore::new(root.path().join("extraction"));
        let datasets = ArtifactStore::new(root.path().join("datasets"));

        assert!(matches!(
            datasets.promote(&extraction, "../secret.csv", "copy"),
            Err(StoreError::InvalidPath(_))
        ));

        let path = extraction
            .write(&[unit("Text.", UnitKind::Sentence)], "batch")
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(matches!(
            datasets.promote(&extraction, &name, "../escaped"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn list_reflects_the_directory_contents() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert!(store.list().unwrap().is_empty());

        store
            .write(&[unit("Text.", UnitKind::Sentence)], "batch")
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "not an artifact").unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.starts_with("batch_"));
    }
}
