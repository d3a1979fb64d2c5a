//! Orchestration: normalize, detect, validate, segment, report.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SplitConfig;
use crate::detect::{Detector, Strategy, detector_for, run_detector};
use crate::error::{Result, SegmentError};
use crate::report::{FailureKind, Status, ValidationReport};
use crate::segment::{ChapterSpan, segment, write_chapters};
use crate::text::{NormalizationStats, SourceDocument, normalize};
use crate::validate::{Anomaly, ValidatedBoundary, validate};

/// Everything a run produced. The report is present in every outcome.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: ValidationReport,
    pub document: SourceDocument,
    /// Every candidate with its verdict, in document order
    pub boundaries: Vec<ValidatedBoundary>,
    /// Empty when the run failed before segmentation
    pub spans: Vec<ChapterSpan>,
}

impl RunOutcome {
    pub fn status(&self) -> Status {
        self.report.status
    }

    /// Span texts in sequence order.
    pub fn chapter_texts(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|span| span.text(&self.document))
    }
}

/// Files written for a run.
#[derive(Debug, Clone)]
pub struct WrittenOutput {
    pub chapters: Vec<PathBuf>,
    pub report: PathBuf,
}

/// A configured segmentation pipeline.
pub struct Pipeline {
    config: SplitConfig,
    detector: Box<dyn Detector>,
}

impl Pipeline {
    /// Validate the configuration and build its detector.
    pub fn new(config: SplitConfig) -> Result<Self> {
        config.validate()?;
        let detector = detector_for(&config)?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Run every stage over in-memory text.
    ///
    /// Never guesses a correction: anomalies go into the report and the
    /// accepted boundaries are used as they are.
    pub fn run(&self, raw: &str) -> RunOutcome {
        let document = normalize(raw);
        let strategy = self.detector.strategy();
        info!(
            "Normalized {} bytes into {} bytes ({:?})",
            raw.len(),
            document.len(),
            document.stats()
        );

        let candidates = match run_detector(self.detector.as_ref(), &document) {
            Ok(candidates) => candidates,
            Err(err) => return self.fail(document, &err, Vec::new()),
        };

        if candidates.is_empty() {
            let err = SegmentError::DetectionEmpty { strategy };
            // The whole text as front matter, kept in memory only
            let spans = segment(&document, &[]).unwrap_or_default();
            return self.fail(document, &err, spans);
        }

        let validation = validate(&candidates, &self.config);
        let accepted: Vec<ValidatedBoundary> = validation.accepted().cloned().collect();

        let spans = match segment(&document, &accepted) {
            Ok(spans) => spans,
            Err(err) => return self.fail(document, &err, Vec::new()),
        };

        let mut anomalies = validation.anomalies.clone();
        let (min, max) = (
            self.config.min_accepted_boundaries,
            self.config.max_accepted_boundaries,
        );
        if !(min..=max).contains(&accepted.len()) {
            let anomaly = Anomaly::AcceptedCountOutOfRange {
                count: accepted.len(),
                min,
                max,
            };
            warn!("Sequence anomaly: {}", anomaly);
            anomalies.push(anomaly);
        }

        let status = if anomalies.is_empty() {
            Status::Accepted
        } else {
            Status::NeedsReview
        };
        match status {
            Status::Accepted => info!("{} chapters accepted", accepted.len()),
            _ => warn!(
                "{} anomalies found; boundaries need review",
                anomalies.len()
            ),
        }

        let report = ValidationReport::from_validation(
            status,
            strategy,
            document.stats(),
            &validation,
            anomalies,
        )
        .with_chapters(
            &spans,
            &self.config.file_prefix,
            &self.config.file_extension,
        );

        RunOutcome {
            report,
            document,
            boundaries: validation.boundaries,
            spans,
        }
    }

    /// Read a source file and run the pipeline on it.
    ///
    /// An unreadable or non-UTF-8 file yields a failed outcome rather than
    /// an error, so there is always a report to write.
    pub fn run_file(&self, input: &Path) -> RunOutcome {
        match read_source(input) {
            Ok(raw) => self.run(&raw),
            Err(err) => self.fail(SourceDocument::default(), &err, Vec::new()),
        }
    }

    /// Write chapter files and the report into `dir`.
    ///
    /// A failed run writes the report only.
    pub fn write(&self, outcome: &RunOutcome, dir: &Path, overwrite: bool) -> Result<WrittenOutput> {
        let chapters = match outcome.status() {
            Status::Failed => Vec::new(),
            Status::Accepted | Status::NeedsReview => write_chapters(
                &outcome.document,
                &outcome.spans,
                dir,
                &self.config,
                overwrite,
            )?,
        };
        let report = outcome.report.write(dir)?;
        Ok(WrittenOutput { chapters, report })
    }

    fn fail(&self, document: SourceDocument, err: &SegmentError, spans: Vec<ChapterSpan>) -> RunOutcome {
        warn!("Segmentation failed: {}", err);
        RunOutcome {
            report: failure_report(self.detector.strategy(), err, document.stats()),
            document,
            boundaries: Vec::new(),
            spans,
        }
    }
}

/// Failed report for an error that ended a run.
pub fn failure_report(
    strategy: Strategy,
    err: &SegmentError,
    normalization: NormalizationStats,
) -> ValidationReport {
    let kind = err.failure_kind().unwrap_or(FailureKind::InputError);
    ValidationReport::failed(strategy, kind, err.to_string(), normalization)
}

/// Read a UTF-8 source file without modifying it.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| SegmentError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|e| SegmentError::InputEncoding {
        path: path.to_path_buf(),
        valid_up_to: e.utf8_error().valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(ordinals: &[u32]) -> String {
        let mut text = String::from("Front matter and copyright page.\n\n");
        for ordinal in ordinals {
            text.push_str(&format!(
                "## {} Chapter Number {}\n\nBody text for this chapter.\n\n",
                ordinal, ordinal
            ));
        }
        text
    }

    #[test]
    fn test_accepted_run() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run(&book(&[1, 2, 3, 4, 5, 6]));

        assert_eq!(outcome.status(), Status::Accepted);
        assert_eq!(outcome.spans.len(), 7);
        assert_eq!(outcome.report.accepted_count, 6);
        assert!(outcome.report.anomalies.is_empty());
        assert_eq!(outcome.report.chapters.len(), 7);
        assert_eq!(outcome.report.chapters[0].file, "chapter-00.md");
        assert_eq!(outcome.report.chapters[3].ordinal, Some(3));
    }

    #[test]
    fn test_too_few_boundaries_needs_review() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run(&book(&[1, 2, 3]));

        assert_eq!(outcome.status(), Status::NeedsReview);
        assert!(matches!(
            outcome.report.anomalies.as_slice(),
            [Anomaly::AcceptedCountOutOfRange {
                count: 3,
                min: 5,
                max: 50
            }]
        ));
        // Spans are still produced
        assert_eq!(outcome.spans.len(), 4);
    }

    #[test]
    fn test_decrease_needs_review() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run(&book(&[1, 2, 3, 6, 4, 5, 7]));
        assert_eq!(outcome.status(), Status::NeedsReview);
        assert_eq!(outcome.report.decrease_count(), 1);
    }

    #[test]
    fn test_no_candidates_fails() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run("Just prose.\n\nNo headings at all.\n");

        assert_eq!(outcome.status(), Status::Failed);
        let failure = outcome.report.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::DetectionEmpty);
        assert_eq!(outcome.spans.len(), 1);
        assert_eq!(outcome.chapter_texts().next(), Some("Just prose.\n\nNo headings at all.\n"));
    }

    #[test]
    fn test_all_rejected_needs_review() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run("## 1 Tiny\n## 2 Tiny\n");

        assert_eq!(outcome.status(), Status::NeedsReview);
        assert_eq!(outcome.report.candidate_count, 2);
        assert_eq!(outcome.report.rejected_count, 2);
        assert_eq!(outcome.spans.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SplitConfig {
            min_ordinal: 9,
            max_ordinal: 1,
            ..SplitConfig::default()
        };
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_run_file_missing_input() {
        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run_file(Path::new("/nonexistent/book.md"));

        assert_eq!(outcome.status(), Status::Failed);
        assert_eq!(
            outcome.report.failure.as_ref().unwrap().kind,
            FailureKind::InputError
        );
        assert!(outcome.spans.is_empty());
    }

    #[test]
    fn test_run_file_invalid_utf8() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("book.md");
        fs::write(&path, [b'o', b'k', 0xff, 0xfe]).unwrap();

        let pipeline = Pipeline::new(SplitConfig::default()).unwrap();
        let outcome = pipeline.run_file(&path);
        assert_eq!(outcome.status(), Status::Failed);
        assert!(
            outcome
                .report
                .failure
                .as_ref()
                .unwrap()
                .message
                .contains("UTF-8")
        );
    }
}
