//! Heuristic acceptance rules for candidate boundaries.
//!
//! Every candidate gets a verdict; nothing is filtered out here. Per-candidate
//! rules run in parallel, the sequence check runs once afterwards over the
//! passing subsequence.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::config::SplitConfig;
use crate::detect::Candidate;

/// A per-candidate rule a boundary failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum RuleViolation {
    TitleTooShort { length: usize, min: usize },
    SpecialCharRatio { ratio: f64, max: f64 },
    NoAlphabetic,
    MissingOrdinal,
    OrdinalOutOfRange { ordinal: u32, min: u32, max: u32 },
    TooCloseToPrevious { lines: usize, min: usize },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TitleTooShort { length, min } => {
                write!(f, "heading has {} characters (minimum {})", length, min)
            }
            Self::SpecialCharRatio { ratio, max } => {
                write!(f, "special character ratio {:.2} exceeds {:.2}", ratio, max)
            }
            Self::NoAlphabetic => write!(f, "title has no alphabetic characters"),
            Self::MissingOrdinal => write!(f, "no usable chapter number"),
            Self::OrdinalOutOfRange { ordinal, min, max } => {
                write!(f, "chapter number {} outside {}-{}", ordinal, min, max)
            }
            Self::TooCloseToPrevious { lines, min } => write!(
                f,
                "only {} lines after the previous candidate (minimum {})",
                lines, min
            ),
        }
    }
}

/// A candidate with its verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedBoundary {
    pub candidate: Candidate,
    /// Empty when the candidate passed
    pub violations: Vec<RuleViolation>,
}

impl ValidatedBoundary {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.candidate.offset
    }
}

/// Non-fatal findings that downgrade a run to needs-review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Anomaly {
    /// Two accepted boundaries share a chapter number
    OrdinalCollision {
        ordinal: u32,
        offset: usize,
        line: usize,
    },
    /// An accepted boundary's number is lower than the one before it
    OrdinalDecrease {
        previous: u32,
        ordinal: u32,
        offset: usize,
        line: usize,
    },
    /// Accepted boundary count outside the configured tolerance
    AcceptedCountOutOfRange { count: usize, min: usize, max: usize },
}

impl Anomaly {
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::OrdinalCollision { .. })
    }

    pub fn is_decrease(&self) -> bool {
        matches!(self, Self::OrdinalDecrease { .. })
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrdinalCollision { ordinal, line, .. } => {
                write!(f, "chapter {} appears again at line {}", ordinal, line)
            }
            Self::OrdinalDecrease {
                previous,
                ordinal,
                line,
                ..
            } => write!(
                f,
                "chapter {} follows chapter {} at line {}",
                ordinal, previous, line
            ),
            Self::AcceptedCountOutOfRange { count, min, max } => write!(
                f,
                "{} accepted boundaries, expected {}-{}",
                count, min, max
            ),
        }
    }
}

/// Inclusive run of chapter numbers missing from the accepted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberingGap {
    pub from: u32,
    pub to: u32,
}

/// Validator output: one verdict per candidate, plus sequence findings.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub boundaries: Vec<ValidatedBoundary>,
    pub anomalies: Vec<Anomaly>,
    pub gaps: Vec<NumberingGap>,
}

impl Validation {
    /// Boundaries that passed every rule, in document order.
    pub fn accepted(&self) -> impl Iterator<Item = &ValidatedBoundary> {
        self.boundaries.iter().filter(|b| b.passed())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &ValidatedBoundary> {
        self.boundaries.iter().filter(|b| !b.passed())
    }
}

/// Validate every candidate and check the accepted numbering.
pub fn validate(candidates: &[Candidate], config: &SplitConfig) -> Validation {
    let boundaries: Vec<ValidatedBoundary> = candidates
        .par_iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let previous = idx.checked_sub(1).map(|prev| &candidates[prev]);
            ValidatedBoundary {
                candidate: candidate.clone(),
                violations: check_candidate(candidate, previous, config),
            }
        })
        .collect();

    for boundary in boundaries.iter().filter(|b| !b.passed()) {
        debug!(
            "Rejected line {} {:?}: {}",
            boundary.candidate.line,
            boundary.candidate.raw_line,
            boundary
                .violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
    }

    let (anomalies, gaps) = check_sequence(&boundaries, config.min_ordinal);
    for anomaly in &anomalies {
        warn!("Sequence anomaly: {}", anomaly);
    }

    let validation = Validation {
        boundaries,
        anomalies,
        gaps,
    };
    info!(
        "Validated {} candidates: {} accepted, {} rejected",
        validation.boundaries.len(),
        validation.accepted().count(),
        validation.rejected().count()
    );
    validation
}

/// Apply the per-candidate rules.
///
/// `previous` is the preceding candidate in document order (accepted or
/// not), used only by the spacing rule.
pub fn check_candidate(
    candidate: &Candidate,
    previous: Option<&Candidate>,
    config: &SplitConfig,
) -> Vec<RuleViolation> {
    let mut violations = Vec::new();
    let title = candidate.title.trim();

    // Whole heading line, so `## 1 Intro` counts as 10 characters
    let length = candidate.raw_line.trim().chars().count();
    if length < config.min_title_length {
        violations.push(RuleViolation::TitleTooShort {
            length,
            min: config.min_title_length,
        });
    }

    let ratio = special_char_ratio(&candidate.raw_line);
    if ratio > config.max_special_char_ratio {
        violations.push(RuleViolation::SpecialCharRatio {
            ratio,
            max: config.max_special_char_ratio,
        });
    }

    if !title.chars().any(char::is_alphabetic) {
        violations.push(RuleViolation::NoAlphabetic);
    }

    match candidate.ordinal {
        None => violations.push(RuleViolation::MissingOrdinal),
        Some(ordinal) if !(config.min_ordinal..=config.max_ordinal).contains(&ordinal) => {
            violations.push(RuleViolation::OrdinalOutOfRange {
                ordinal,
                min: config.min_ordinal,
                max: config.max_ordinal,
            });
        }
        Some(_) => {}
    }

    if config.min_spacing_lines > 0 {
        if let Some(previous) = previous {
            let lines = candidate.line.saturating_sub(previous.line);
            if lines < config.min_spacing_lines {
                violations.push(RuleViolation::TooCloseToPrevious {
                    lines,
                    min: config.min_spacing_lines,
                });
            }
        }
    }

    violations
}

/// Fraction of characters that are neither alphanumeric nor whitespace.
pub fn special_char_ratio(line: &str) -> f64 {
    let total = line.chars().count();
    if total == 0 {
        return 0.0;
    }
    let special = line
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    special as f64 / total as f64
}

/// Check ordinals across the accepted boundaries.
///
/// A repeated number is a collision; a number lower than its predecessor
/// (and not seen before) is a decrease. Gaps are reported separately and
/// are not anomalies.
pub fn check_sequence(
    boundaries: &[ValidatedBoundary],
    min_ordinal: u32,
) -> (Vec<Anomaly>, Vec<NumberingGap>) {
    let mut anomalies = Vec::new();
    let mut seen = BTreeSet::new();
    let mut previous: Option<u32> = None;

    for boundary in boundaries.iter().filter(|b| b.passed()) {
        let Some(ordinal) = boundary.candidate.ordinal else {
            continue;
        };
        let offset = boundary.candidate.offset;
        let line = boundary.candidate.line;

        if seen.contains(&ordinal) {
            anomalies.push(Anomaly::OrdinalCollision {
                ordinal,
                offset,
                line,
            });
        } else if let Some(prev) = previous.filter(|&prev| ordinal < prev) {
            anomalies.push(Anomaly::OrdinalDecrease {
                previous: prev,
                ordinal,
                offset,
                line,
            });
        }

        seen.insert(ordinal);
        previous = Some(ordinal);
    }

    (anomalies, numbering_gaps(&seen, min_ordinal))
}

fn numbering_gaps(seen: &BTreeSet<u32>, min_ordinal: u32) -> Vec<NumberingGap> {
    let mut gaps = Vec::new();
    let mut expected = min_ordinal;

    for &ordinal in seen.iter().filter(|&&o| o >= min_ordinal) {
        if ordinal > expected {
            gaps.push(NumberingGap {
                from: expected,
                to: ordinal - 1,
            });
        }
        expected = ordinal.saturating_add(1);
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Strategy;

    fn candidate(ordinal: Option<u32>, title: &str, line: usize) -> Candidate {
        let number = ordinal.map(|o| o.to_string()).unwrap_or_default();
        Candidate {
            ordinal,
            title: title.to_string(),
            raw_line: format!("## {} {}", number, title),
            offset: line * 100,
            line,
            strategy: Strategy::Pattern,
        }
    }

    fn sequence(ordinals: &[u32]) -> Vec<Candidate> {
        ordinals
            .iter()
            .enumerate()
            .map(|(i, &o)| candidate(Some(o), "A Reasonable Chapter Title", (i + 1) * 10))
            .collect()
    }

    #[test]
    fn test_good_candidate_passes() {
        let c = candidate(Some(3), "Memory Management", 1);
        assert!(check_candidate(&c, None, &SplitConfig::default()).is_empty());
    }

    #[test]
    fn test_short_heading_rejected() {
        let c = candidate(Some(3), "Tiny", 1);
        let violations = check_candidate(&c, None, &SplitConfig::default());
        assert_eq!(
            violations,
            vec![RuleViolation::TitleTooShort { length: 9, min: 10 }]
        );
    }

    #[test]
    fn test_short_title_on_full_heading_passes() {
        let config = SplitConfig::default();
        assert!(check_candidate(&candidate(Some(1), "Intro", 1), None, &config).is_empty());
        assert!(check_candidate(&candidate(Some(12), "Appendix", 1), None, &config).is_empty());

        // Surrounding whitespace is not counted
        let mut c = candidate(Some(3), "Tiny", 1);
        c.raw_line = "  ## 3 Tiny   ".to_string();
        assert_eq!(
            check_candidate(&c, None, &config),
            vec![RuleViolation::TitleTooShort { length: 9, min: 10 }]
        );
    }

    #[test]
    fn test_symbol_heavy_line_rejected() {
        let mut c = candidate(Some(3), "Memory Management", 1);
        c.raw_line = "## 3 Memory ~~~ |||| Management %%%% ^^^^ ####".to_string();
        let violations = check_candidate(&c, None, &SplitConfig::default());
        assert!(matches!(
            violations.as_slice(),
            [RuleViolation::SpecialCharRatio { .. }]
        ));
    }

    #[test]
    fn test_no_alphabetic_rejected() {
        let c = candidate(Some(3), "1234 5678 90", 1);
        let violations = check_candidate(&c, None, &SplitConfig::default());
        assert_eq!(violations, vec![RuleViolation::NoAlphabetic]);
    }

    #[test]
    fn test_ordinal_plausibility() {
        let config = SplitConfig::default();

        let c = candidate(Some(0), "Memory Management", 1);
        assert_eq!(
            check_candidate(&c, None, &config),
            vec![RuleViolation::OrdinalOutOfRange {
                ordinal: 0,
                min: 1,
                max: 50
            }]
        );

        let c = candidate(Some(1998), "Memory Management", 1);
        assert_eq!(check_candidate(&c, None, &config).len(), 1);

        let c = candidate(None, "Memory Management", 1);
        assert_eq!(
            check_candidate(&c, None, &config),
            vec![RuleViolation::MissingOrdinal]
        );
    }

    #[test]
    fn test_spacing_rule() {
        let config = SplitConfig {
            min_spacing_lines: 5,
            ..SplitConfig::default()
        };
        let first = candidate(Some(1), "Kernel Architecture", 10);
        let close = candidate(Some(2), "Memory Management", 12);
        let far = candidate(Some(2), "Memory Management", 40);

        assert!(check_candidate(&first, None, &config).is_empty());
        assert_eq!(
            check_candidate(&close, Some(&first), &config),
            vec![RuleViolation::TooCloseToPrevious { lines: 2, min: 5 }]
        );
        assert!(check_candidate(&far, Some(&first), &config).is_empty());

        // Disabled by default
        assert!(check_candidate(&close, Some(&first), &SplitConfig::default()).is_empty());
    }

    #[test]
    fn test_special_char_ratio() {
        assert_eq!(special_char_ratio(""), 0.0);
        assert_eq!(special_char_ratio("## 1 Intro"), 0.2);
        assert_eq!(special_char_ratio("abc def"), 0.0);
        assert_eq!(special_char_ratio("####"), 1.0);
    }

    #[test]
    fn test_validate_keeps_every_candidate_in_order() {
        let mut candidates = sequence(&[1, 2, 3]);
        candidates[1].title = "x".to_string();
        let validation = validate(&candidates, &SplitConfig::default());

        assert_eq!(validation.boundaries.len(), 3);
        for (boundary, candidate) in validation.boundaries.iter().zip(&candidates) {
            assert_eq!(&boundary.candidate, candidate);
        }
        assert_eq!(validation.accepted().count(), 2);
        assert_eq!(validation.rejected().count(), 1);
    }

    #[test]
    fn test_collision_and_gap() {
        let validation = validate(&sequence(&[1, 2, 2, 5]), &SplitConfig::default());

        let collisions = validation.anomalies.iter().filter(|a| a.is_collision()).count();
        let decreases = validation.anomalies.iter().filter(|a| a.is_decrease()).count();
        assert_eq!(collisions, 1);
        assert_eq!(decreases, 0);
        assert_eq!(validation.gaps, vec![NumberingGap { from: 3, to: 4 }]);
    }

    #[test]
    fn test_decrease() {
        let validation = validate(&sequence(&[1, 3, 2, 4]), &SplitConfig::default());
        assert_eq!(validation.anomalies.len(), 1);
        assert!(matches!(
            validation.anomalies[0],
            Anomaly::OrdinalDecrease {
                previous: 3,
                ordinal: 2,
                ..
            }
        ));
        assert!(validation.gaps.is_empty());
    }

    #[test]
    fn test_rejected_candidates_ignored_by_sequence_check() {
        let mut candidates = sequence(&[1, 2, 2, 3]);
        candidates[2].title = "??".to_string();
        let validation = validate(&candidates, &SplitConfig::default());
        assert!(validation.anomalies.is_empty());
    }

    #[test]
    fn test_leading_gap() {
        let validation = validate(&sequence(&[3, 4, 5]), &SplitConfig::default());
        assert_eq!(validation.gaps, vec![NumberingGap { from: 1, to: 2 }]);
        assert!(validation.anomalies.is_empty());
    }

    #[test]
    fn test_clean_sequence() {
        let validation = validate(&sequence(&[1, 2, 3, 4, 5, 6]), &SplitConfig::default());
        assert!(validation.anomalies.is_empty());
        assert!(validation.gaps.is_empty());
    }

    #[test]
    fn test_empty_candidates() {
        let validation = validate(&[], &SplitConfig::default());
        assert!(validation.boundaries.is_empty());
        assert!(validation.anomalies.is_empty());
    }
}
