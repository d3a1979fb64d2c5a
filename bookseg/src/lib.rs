//! Chapter segmentation for OCR-derived markdown books.
//!
//! The pipeline runs in one direction, each stage producing a new value:
//! - [`text::normalize`] repairs ligatures, hyphenated line breaks and page
//!   numbers bleeding into headings
//! - [`detect`] finds candidate chapter headings (pattern or structural)
//! - [`validate::validate`] gives every candidate a verdict and checks the numbering
//! - [`segment::segment`] cuts the text into contiguous chapter spans
//! - [`Pipeline`] runs the stages and decides accepted / needs-review / failed

pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod text;
pub mod validate;

pub use config::SplitConfig;
pub use detect::{Candidate, Detector, Strategy, StrategyComparison};
pub use error::{Result, SegmentError};
pub use pipeline::{Pipeline, RunOutcome, WrittenOutput};
pub use report::{FailureKind, Status, ValidationReport};
pub use segment::ChapterSpan;
pub use text::{SourceDocument, normalize};
pub use validate::{Anomaly, ValidatedBoundary};
