//! Line-by-line regex detection.

use log::debug;
use regex::Regex;

use super::{Candidate, Detector, Strategy, clean_title};
use crate::config::{SplitConfig, compile_heading_pattern};
use crate::error::Result;
use crate::text::SourceDocument;

/// Matches heading lines with a regex, one line at a time.
///
/// Linear in document length. Cannot tell a heading from a `#` line inside
/// a fenced code block.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    regex: Regex,
}

impl PatternDetector {
    pub fn new(config: &SplitConfig) -> Result<Self> {
        let regex = match &config.heading_pattern {
            Some(pattern) => compile_heading_pattern(pattern)?,
            None => Regex::new(&default_pattern(config.heading_marker_count))?,
        };
        Ok(Self { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    fn match_line(&self, line: &str) -> Option<(Option<u32>, String)> {
        let caps = self.regex.captures(line)?;
        let ordinal = caps
            .name("ordinal")
            .and_then(|m| m.as_str().trim().parse().ok());
        let title = caps
            .name("title")
            .map(|m| clean_title(m.as_str()))
            .unwrap_or_default();
        Some((ordinal, title))
    }
}

/// Exactly `markers` hashes, whitespace, digits, then an optional title.
fn default_pattern(markers: usize) -> String {
    format!(
        r"^{}[ \t]+(?P<ordinal>\d+)(?:[ \t]+(?P<title>.*?))?[ \t]*$",
        "#".repeat(markers)
    )
}

impl Detector for PatternDetector {
    fn detect(&self, doc: &SourceDocument) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut offset = 0;

        for (line_idx, line) in doc.text().split_inclusive('\n').enumerate() {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let content = content.strip_suffix('\r').unwrap_or(content);

            if let Some((ordinal, title)) = self.match_line(content) {
                let line_no = doc.original_line_at(line_idx);
                debug!("Pattern candidate at line {}: {:?}", line_no, content);
                candidates.push(Candidate {
                    ordinal,
                    title,
                    raw_line: content.to_string(),
                    offset,
                    line: line_no,
                    strategy: Strategy::Pattern,
                });
            }

            offset += line.len();
        }

        Ok(candidates)
    }

    fn strategy(&self) -> Strategy {
        Strategy::Pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;
    use crate::text::normalize;

    fn detect(text: &str) -> Vec<Candidate> {
        let doc = normalize(text);
        PatternDetector::new(&SplitConfig::default())
            .unwrap()
            .detect(&doc)
            .unwrap()
    }

    #[test]
    fn test_detects_secondary_headings() {
        let text = "Preface text\n## 1 Kernel Architecture\nbody\n## 2 Memory Management\nmore\n";
        let candidates = detect(text);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].ordinal, Some(1));
        assert_eq!(candidates[0].title, "Kernel Architecture");
        assert_eq!(candidates[0].offset, text.find("## 1").unwrap());
        assert_eq!(candidates[0].line, 2);
        assert_eq!(candidates[1].raw_line, "## 2 Memory Management");
        assert_eq!(candidates[1].line, 4);
    }

    #[test]
    fn test_requires_exact_marker_count() {
        let candidates = detect("# 1 Part One Begins\n### 2 Subsection Title\n## 3 Real Chapter\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ordinal, Some(3));
    }

    #[test]
    fn test_ignores_unnumbered_headings() {
        let candidates = detect("## Introduction\n## 1Intro\n");
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_number_only_heading_has_empty_title() {
        let candidates = detect("## 7\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ordinal, Some(7));
        assert_eq!(candidates[0].title, "");
    }

    #[test]
    fn test_matches_inside_code_blocks() {
        let candidates = detect("```\n## 4 Looks Like A Heading\n```\n");
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_crlf_lines() {
        let text = "intro\r\n## 1 Kernel Architecture\r\nbody\r\n";
        let candidates = detect(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Kernel Architecture");
        assert_eq!(candidates[0].offset, 7);
    }

    #[test]
    fn test_page_number_removed_before_matching() {
        let candidates = detect("## 5 Storage Drivers   211\n");
        assert_eq!(candidates[0].title, "Storage Drivers");
    }

    #[test]
    fn test_custom_pattern() {
        let config = SplitConfig {
            heading_pattern: Some(r"^CHAPTER (?P<ordinal>\d+)\s*[:.-]\s*(?P<title>.+)$".to_string()),
            ..SplitConfig::default()
        };
        let detector = PatternDetector::new(&config).unwrap();
        let doc = normalize("CHAPTER 3: Interrupt Handling\n## 1 Ignored Heading\n");
        let candidates = detector.detect(&doc).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ordinal, Some(3));
        assert_eq!(candidates[0].title, "Interrupt Handling");
    }

    #[test]
    fn test_custom_pattern_title_loses_page_number() {
        let config = SplitConfig {
            heading_pattern: Some(r"^CHAPTER (?P<ordinal>\d+): (?P<title>.+)$".to_string()),
            ..SplitConfig::default()
        };
        let detector = PatternDetector::new(&config).unwrap();
        let doc = normalize("CHAPTER 3: Interrupt Handling   45
");
        let candidates = detector.detect(&doc).unwrap();
        assert_eq!(candidates[0].title, "Interrupt Handling");
        assert_eq!(candidates[0].raw_line, "CHAPTER 3: Interrupt Handling   45");
    }

    #[test]
    fn test_custom_pattern_requires_ordinal_group() {
        let config = SplitConfig {
            heading_pattern: Some(r"^CHAPTER (\d+)$".to_string()),
            ..SplitConfig::default()
        };
        assert!(matches!(
            PatternDetector::new(&config),
            Err(SegmentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let config = SplitConfig {
            heading_pattern: Some(r"^(?P<ordinal>\d+".to_string()),
            ..SplitConfig::default()
        };
        assert!(matches!(
            PatternDetector::new(&config),
            Err(SegmentError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_default_pattern_for_level_one() {
        let config = SplitConfig {
            heading_marker_count: 1,
            ..SplitConfig::default()
        };
        let detector = PatternDetector::new(&config).unwrap();
        assert!(detector.pattern().starts_with("^#[ \\t]+"));
    }
}
