use std::path::PathBuf;

use thiserror::Error;

use crate::detect::Strategy;
use crate::report::FailureKind;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Failed to read input {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input {} is not valid UTF-8 (first invalid byte at {valid_up_to})", path.display())]
    InputEncoding { path: PathBuf, valid_up_to: usize },

    #[error("No chapter candidates found using the {strategy} strategy; check the heading marker count")]
    DetectionEmpty { strategy: Strategy },

    #[error("Detector produced offset {offset} after offset {previous}; offsets must be strictly increasing")]
    InternalConsistency { previous: usize, offset: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid heading pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Refusing to overwrite existing output file {}", .0.display())]
    OutputExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SegmentError {
    /// The report-level failure class for errors that end a run.
    ///
    /// Output-side errors (writing chapters or the report) have no class:
    /// they happen after the report is final.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::InputUnreadable { .. } | Self::InputEncoding { .. } => {
                Some(FailureKind::InputError)
            }
            Self::DetectionEmpty { .. } => Some(FailureKind::DetectionEmpty),
            Self::InternalConsistency { .. } => Some(FailureKind::InternalConsistency),
            Self::InvalidConfig(_) | Self::InvalidPattern(_) => Some(FailureKind::InvalidConfig),
            Self::OutputExists(_)
            | Self::Io(_)
            | Self::TomlParse(_)
            | Self::TomlSerialize(_)
            | Self::Json(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        let err = SegmentError::DetectionEmpty {
            strategy: Strategy::Pattern,
        };
        assert_eq!(err.failure_kind(), Some(FailureKind::DetectionEmpty));

        let err = SegmentError::InternalConsistency {
            previous: 10,
            offset: 10,
        };
        assert_eq!(err.failure_kind(), Some(FailureKind::InternalConsistency));

        let err = SegmentError::OutputExists(PathBuf::from("/tmp/chapter-00.md"));
        assert_eq!(err.failure_kind(), None);
    }

    #[test]
    fn test_detection_empty_message_names_strategy() {
        let err = SegmentError::DetectionEmpty {
            strategy: Strategy::Structural,
        };
        assert!(err.to_string().contains("structural"));
    }
}
