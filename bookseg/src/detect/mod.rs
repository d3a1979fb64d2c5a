//! Chapter boundary detection.
//!
//! Two interchangeable strategies scan the normalized text for chapter
//! headings:
//! - [`PatternDetector`]: regex over raw lines, fast but blind to code blocks
//! - [`StructuralDetector`]: walks markdown heading nodes, skipping literal blocks
//!
//! Both yield [`Candidate`]s in strictly increasing offset order.

mod pattern;
mod structural;

pub use pattern::PatternDetector;
pub use structural::StructuralDetector;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SplitConfig;
use crate::error::{Result, SegmentError};
use crate::text::SourceDocument;

/// Heading text after the markers: `12 Network Stack`.
static HEADING_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<ordinal>\d+)(?:\s+(?P<title>.*?))?\s*$")
        .expect("heading text pattern is valid")
});

/// Title ending in a page number: `Storage Drivers   211`.
static TITLE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<head>.*[^\s-])[ \t]+\d{1,4}$").expect("title page number pattern is valid")
});

/// Which detection strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Pattern,
    Structural,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Structural => write!(f, "structural"),
        }
    }
}

impl FromStr for Strategy {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pattern" | "regex" => Ok(Self::Pattern),
            "structural" | "structure" | "tree" => Ok(Self::Structural),
            _ => Err(SegmentError::InvalidConfig(format!("Unknown strategy: {}", s))),
        }
    }
}

/// A potential chapter start found by a detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Chapter number from the heading, if it parsed
    pub ordinal: Option<u32>,
    /// Title text after the ordinal, trimmed
    pub title: String,
    /// The whole heading line as it appears in the normalized text
    pub raw_line: String,
    /// Byte offset of the heading line start in the normalized text
    pub offset: usize,
    /// 1-based line in the original source
    pub line: usize,
    pub strategy: Strategy,
}

/// A boundary detection strategy.
pub trait Detector: Send + Sync {
    /// Scan the document for chapter heading candidates, in document order.
    fn detect(&self, doc: &SourceDocument) -> Result<Vec<Candidate>>;

    /// Strategy name for reports and logs
    fn strategy(&self) -> Strategy;
}

/// Create the detector selected by the configuration.
pub fn detector_for(config: &SplitConfig) -> Result<Box<dyn Detector>> {
    match config.strategy {
        Strategy::Pattern => Ok(Box::new(PatternDetector::new(config)?)),
        Strategy::Structural => Ok(Box::new(StructuralDetector::new(config)?)),
    }
}

/// Run a detector and check its ordering guarantee.
pub fn run_detector(detector: &dyn Detector, doc: &SourceDocument) -> Result<Vec<Candidate>> {
    let candidates = detector.detect(doc)?;
    ensure_strictly_increasing(&candidates)?;

    info!(
        "{} strategy found {} candidate boundaries",
        detector.strategy(),
        candidates.len()
    );
    Ok(candidates)
}

/// Detect candidates with the configured strategy.
pub fn detect(doc: &SourceDocument, config: &SplitConfig) -> Result<Vec<Candidate>> {
    let detector = detector_for(config)?;
    run_detector(detector.as_ref(), doc)
}

/// Fail on out-of-order or duplicate offsets instead of repairing them.
pub fn ensure_strictly_increasing(candidates: &[Candidate]) -> Result<()> {
    for pair in candidates.windows(2) {
        if pair[1].offset <= pair[0].offset {
            return Err(SegmentError::InternalConsistency {
                previous: pair[0].offset,
                offset: pair[1].offset,
            });
        }
    }
    Ok(())
}

/// Split heading text into ordinal and title.
///
/// Returns `None` when the text has no leading number. The ordinal is
/// `None` when the digits don't fit a `u32`.
pub(crate) fn split_heading_text(text: &str) -> Option<(Option<u32>, String)> {
    let caps = HEADING_TEXT.captures(text)?;
    let ordinal = caps["ordinal"].parse().ok();
    let title = caps
        .name("title")
        .map(|m| clean_title(m.as_str()))
        .unwrap_or_default();
    Some((ordinal, title))
}

/// Trim a title and drop page numbers trailing it.
///
/// The normalizer already strips them from `#` heading lines; this covers
/// setext headings and lines matched by a custom pattern.
pub(crate) fn clean_title(title: &str) -> String {
    let mut title = title.trim();
    while let Some(head) = TITLE_PAGE_NUMBER
        .captures(title)
        .and_then(|caps| caps.name("head"))
    {
        title = head.as_str();
    }
    title.to_string()
}

/// Both strategies' results on one document, matched by offset.
///
/// Nothing is reconciled; the comparison is for manual review.
#[derive(Debug, Clone, Default)]
pub struct StrategyComparison {
    /// (pattern, structural) pairs at the same offset
    pub matched: Vec<(Candidate, Candidate)>,
    pub pattern_only: Vec<Candidate>,
    pub structural_only: Vec<Candidate>,
}

impl StrategyComparison {
    /// Matched pairs whose extracted titles differ.
    pub fn title_mismatches(&self) -> impl Iterator<Item = &(Candidate, Candidate)> {
        self.matched.iter().filter(|(p, s)| p.title != s.title)
    }

    pub fn agrees(&self) -> bool {
        self.pattern_only.is_empty()
            && self.structural_only.is_empty()
            && self.title_mismatches().next().is_none()
    }
}

/// Run both strategies over the same document.
pub fn compare(doc: &SourceDocument, config: &SplitConfig) -> Result<StrategyComparison> {
    let pattern = run_detector(&PatternDetector::new(config)?, doc)?;
    let structural = run_detector(&StructuralDetector::new(config)?, doc)?;

    let mut comparison = StrategyComparison::default();
    let mut pattern = pattern.into_iter().peekable();
    let mut structural = structural.into_iter().peekable();

    loop {
        match (pattern.peek(), structural.peek()) {
            (Some(p), Some(s)) if p.offset == s.offset => {
                if let (Some(p), Some(s)) = (pattern.next(), structural.next()) {
                    comparison.matched.push((p, s));
                }
            }
            (Some(p), Some(s)) if p.offset < s.offset => {
                comparison.pattern_only.extend(pattern.next());
            }
            (Some(_), Some(_)) => {
                comparison.structural_only.extend(structural.next());
            }
            (Some(_), None) => comparison.pattern_only.extend(pattern.next()),
            (None, Some(_)) => comparison.structural_only.extend(structural.next()),
            (None, None) => break,
        }
    }

    Ok(comparison)
}
