//! The per-run validation report.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::Strategy;
use crate::error::Result;
use crate::segment::{ChapterSpan, file_name};
use crate::text::NormalizationStats;
use crate::validate::{Anomaly, NumberingGap, RuleViolation, Validation};

/// File name of the report inside the output directory.
pub const REPORT_FILE: &str = "report.json";

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Accepted,
    NeedsReview,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::NeedsReview => write!(f, "needs-review"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InputError,
    DetectionEmpty,
    InternalConsistency,
    InvalidConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

/// A candidate that failed validation, with its reasons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub line: usize,
    pub offset: usize,
    pub ordinal: Option<u32>,
    pub raw_line: String,
    pub reasons: Vec<RuleViolation>,
}

/// One emitted chapter file and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterEntry {
    pub index: usize,
    pub file: String,
    pub start: usize,
    pub end: usize,
    /// Source line of the heading; `None` for front matter
    pub line: Option<usize>,
    pub ordinal: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    pub strategy: Strategy,
    pub normalization: NormalizationStats,
    pub candidate_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub rejections: Vec<Rejection>,
    pub anomalies: Vec<Anomaly>,
    pub numbering_gaps: Vec<NumberingGap>,
    pub chapters: Vec<ChapterEntry>,
}

impl ValidationReport {
    /// Report for a run that stopped before validation finished.
    pub fn failed(
        strategy: Strategy,
        kind: FailureKind,
        message: impl Into<String>,
        normalization: NormalizationStats,
    ) -> Self {
        Self {
            status: Status::Failed,
            failure: Some(Failure {
                kind,
                message: message.into(),
            }),
            strategy,
            normalization,
            candidate_count: 0,
            accepted_count: 0,
            rejected_count: 0,
            rejections: Vec::new(),
            anomalies: Vec::new(),
            numbering_gaps: Vec::new(),
            chapters: Vec::new(),
        }
    }

    /// Report from a completed validation; the status is decided by the caller.
    pub fn from_validation(
        status: Status,
        strategy: Strategy,
        normalization: NormalizationStats,
        validation: &Validation,
        anomalies: Vec<Anomaly>,
    ) -> Self {
        let rejections: Vec<Rejection> = validation
            .rejected()
            .map(|b| Rejection {
                line: b.candidate.line,
                offset: b.candidate.offset,
                ordinal: b.candidate.ordinal,
                raw_line: b.candidate.raw_line.clone(),
                reasons: b.violations.clone(),
            })
            .collect();

        Self {
            status,
            failure: None,
            strategy,
            normalization,
            candidate_count: validation.boundaries.len(),
            accepted_count: validation.accepted().count(),
            rejected_count: rejections.len(),
            rejections,
            anomalies,
            numbering_gaps: validation.gaps.clone(),
            chapters: Vec::new(),
        }
    }

    /// Record the chapter manifest for the emitted spans.
    pub fn with_chapters(mut self, spans: &[ChapterSpan], prefix: &str, extension: &str) -> Self {
        self.chapters = spans
            .iter()
            .map(|span| ChapterEntry {
                index: span.index,
                file: file_name(span.index, spans.len(), prefix, extension),
                start: span.start,
                end: span.end,
                line: span.boundary.as_ref().map(|b| b.candidate.line),
                ordinal: span.ordinal(),
                title: span.title().map(str::to_string),
            })
            .collect();
        self
    }

    pub fn collision_count(&self) -> usize {
        self.anomalies.iter().filter(|a| a.is_collision()).count()
    }

    pub fn decrease_count(&self) -> usize {
        self.anomalies.iter().filter(|a| a.is_decrease()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `report.json` into `dir`, creating the directory if needed.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&Status::NeedsReview).unwrap(),
            "\"needs-review\""
        );
        assert_eq!(Status::Accepted.to_string(), "accepted");
    }

    #[test]
    fn test_failed_report_json() {
        let report = ValidationReport::failed(
            Strategy::Pattern,
            FailureKind::DetectionEmpty,
            "no candidates",
            NormalizationStats::default(),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure"]["kind"], "detection-empty");
        assert_eq!(json["strategy"], "pattern");
        assert_eq!(json["candidate_count"], 0);
    }

    #[test]
    fn test_anomaly_serialization() {
        let anomaly = Anomaly::OrdinalCollision {
            ordinal: 2,
            offset: 40,
            line: 5,
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["kind"], "ordinal-collision");
        assert_eq!(json["ordinal"], 2);
    }

    #[test]
    fn test_write_report() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let report = ValidationReport::failed(
            Strategy::Structural,
            FailureKind::InputError,
            "unreadable",
            NormalizationStats::default(),
        );
        let path = report.write(&temp_dir.path().join("nested")).unwrap();
        assert!(path.ends_with(REPORT_FILE));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("input-error"));
    }
}
