use crate::adapters::extract_raw;
use crate::cleaner::Cleaner;
use crate::error::ExtractError;
use crate::metadata::MetadataStore;
use crate::models::{ExtractedUnit, ExtractionReport, FileOutcome, FileStatus, UnitKind};
use crate::segment::Strategies;
use crate::storage::ensure_relative;
use std::path::{Path, PathBuf};

/// Runs the adapter → cleaner → segmenter → filter chain over a batch of
/// uploaded files. Strictly sequential; each file produces its own unit list
/// and failures never cross file boundaries.
pub struct ExtractionPipeline {
    upload_dir: PathBuf,
    metadata: MetadataStore,
    strategies: Strategies,
    cleaner: Cleaner,
}

impl ExtractionPipeline {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        strategies: Strategies,
    ) -> Result<Self, ExtractError> {
        let upload_dir = upload_dir.into();
        Ok(Self {
            metadata: MetadataStore::new(&upload_dir),
            upload_dir,
            strategies,
            cleaner: Cleaner::new()?,
        })
    }

    /// One outcome per requested filename, always. A filename that would
    /// escape the upload directory or a failing file records
    /// `error:<message>`; a missing file records `not_found`; none of them
    /// abort the rest of the batch.
    pub fn run(&self, filenames: &[String]) -> ExtractionReport {
        let mut outcomes = Vec::with_capacity(filenames.len());
        let mut units = Vec::new();

        for filename in filenames {
            if let Err(error) = ensure_relative(filename) {
                outcomes.push(FileOutcome {
                    filename: filename.clone(),
                    status: FileStatus::Error(error.to_string()),
                });
                continue;
            }

            let path = self.upload_dir.join(filename);
            if !path.exists() {
                outcomes.push(FileOutcome {
                    filename: filename.clone(),
                    status: FileStatus::NotFound,
                });
                continue;
            }

            match self.extract_file(&path, filename) {
                Ok(file_units) => {
                    units.extend(file_units);
                    outcomes.push(FileOutcome {
                        filename: filename.clone(),
                        status: FileStatus::Success,
                    });
                }
                Err(error) => outcomes.push(FileOutcome {
                    filename: filename.clone(),
                    status: FileStatus::Error(error.to_string()),
                }),
            }
        }

        ExtractionReport { outcomes, units }
    }

    /// The paragraph pass and the sentence pass are filtered independently;
    /// a text that survives both appears twice, once per unit kind.
    fn extract_file(&self, path: &Path, filename: &str) -> Result<Vec<ExtractedUnit>, ExtractError> {
        let classification = self.metadata.classification_for(filename);
        let blocks = extract_raw(path)?;
        let mut units = Vec::new();

        for block in blocks {
            let cleaned = self.cleaner.clean(&block);

            for paragraph in self.strategies.segmenter.to_paragraphs(&cleaned) {
                if self.strategies.filter.is_meaningful(&paragraph) {
                    units.push(ExtractedUnit {
                        text: paragraph,
                        source: filename.to_string(),
                        security_classification: classification.clone(),
                        unit_type: UnitKind::Paragraph,
                    });
                }
            }

            for sentence in self.strategies.segmenter.to_sentences(&cleaned) {
                if self.strategies.filter.is_meaningful(&sentence) {
                    units.push(ExtractedUnit {
                        text: sentence,
                        source: filename.to_string(),
                        security_classification: classification.clone(),
                        unit_type: UnitKind::Sentence,
                    });
                }
            }
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataStore;
    use crate::segment::select_strategies;
    use std::fs;
    use tempfile::tempdir;

    fn pipeline_for(dir: &Path) -> ExtractionPipeline {
        let strategies = select_strategies(None).unwrap();
        ExtractionPipeline::new(dir, strategies).unwrap()
    }

    #[test]
    fn missing_file_records_not_found_and_no_units() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_for(dir.path());

        let report = pipeline.run(&["missing.txt".to_string()]);

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].filename, "missing.txt");
        assert_eq!(report.outcomes[0].status, FileStatus::NotFound);
        assert!(report.units.is_empty());
    }

    #[test]
    fn valid_and_missing_files_produce_independent_outcomes() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("good.txt"),
            "The quick brown fox jumps over the lazy dog. Another meaningful sentence follows right here.",
        )
        .unwrap();

        let pipeline = pipeline_for(dir.path());
        let report = pipeline.run(&["good.txt".to_string(), "missing.txt".to_string()]);

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, FileStatus::Success);
        assert_eq!(report.outcomes[1].status, FileStatus::NotFound);

        assert!(!report.units.is_empty());
        assert!(report.units.iter().all(|unit| unit.source == "good.txt"));
    }

    #[test]
    fn surviving_text_appears_as_both_paragraph_and_sentences() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.txt"),
            "The quick brown fox jumps over the lazy dog.",
        )
        .unwrap();

        let pipeline = pipeline_for(dir.path());
        let report = pipeline.run(&["a.txt".to_string()]);

        let paragraphs: Vec<_> = report
            .units
            .iter()
            .filter(|unit| unit.unit_type == UnitKind::Paragraph)
            .collect();
        let sentences: Vec<_> = report
            .units
            .iter()
            .filter(|unit| unit.unit_type == UnitKind::Sentence)
            .collect();

        assert_eq!(paragraphs.len(), 1);
        assert_eq!(sentences.len(), 1);
        assert_eq!(paragraphs[0].text, sentences[0].text);
    }

    #[test]
    fn units_carry_the_sidecar_classification() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("tagged.txt"),
            "The quick brown fox jumps over the lazy dog.",
        )
        .unwrap();
        MetadataStore::new(dir.path())
            .set_classification("tagged.txt", "Restricted")
            .unwrap();

        let pipeline = pipeline_for(dir.path());
        let report = pipeline.run(&["tagged.txt".to_string()]);

        assert!(!report.units.is_empty());
        assert!(report
            .units
            .iter()
            .all(|unit| unit.security_classification == "Restricted"));
    }

    #[test]
    fn undecodable_file_records_an_error_without_aborting_the_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe]).unwrap();
        fs::write(
            dir.path().join("good.txt"),
            "The quick brown fox jumps over the lazy dog.",
        )
        .unwrap();

        let pipeline = pipeline_for(dir.path());
        let report = pipeline.run(&["bad.txt".to_string(), "good.txt".to_string()]);

        assert!(matches!(report.outcomes[0].status, FileStatus::Error(_)));
        assert_eq!(report.outcomes[1].status, FileStatus::Success);
        assert!(report.units.iter().all(|unit| unit.source == "good.txt"));
    }

    #[test]
    fn filenames_that_escape_the_upload_dir_record_an_error() {
        let root = tempdir().unwrap();
        let uploads = root.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        fs::write(
            root.path().join("outside.txt"),
            "The quick brown fox jumps over the lazy dog.",
        )
        .unwrap();

        let pipeline = pipeline_for(&uploads);
        let report = pipeline.run(&["../outside.txt".to_string()]);

        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.outcomes[0].status, FileStatus::Error(_)));
        assert!(report.units.is_empty());
    }

    #[test]
    fn short_noise_is_filtered_out() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("noise.txt"), "a b").unwrap();

        let pipeline = pipeline_for(dir.path());
        let report = pipeline.run(&["noise.txt".to_string()]);

        assert_eq!(report.outcomes[0].status, FileStatus::Success);
        assert!(report.units.is_empty());
    }
}
