//! Markdown-tree detection via heading events.

use log::{debug, warn};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::{Candidate, Detector, Strategy, split_heading_text};
use crate::config::SplitConfig;
use crate::error::{Result, SegmentError};
use crate::text::SourceDocument;

/// Walks the markdown event tree and keeps numbered headings at one level.
///
/// Headings under a code or HTML block are skipped, which removes the main
/// false-positive source of [`super::PatternDetector`].
#[derive(Debug, Clone)]
pub struct StructuralDetector {
    level: usize,
}

/// Heading being collected between its start and end events.
struct OpenHeading {
    line_start: usize,
    text: String,
}

impl StructuralDetector {
    pub fn new(config: &SplitConfig) -> Result<Self> {
        if !(1..=6).contains(&config.heading_marker_count) {
            return Err(SegmentError::InvalidConfig(format!(
                "structural strategy needs a heading level between 1 and 6, got {}",
                config.heading_marker_count
            )));
        }
        if config.heading_pattern.is_some() {
            warn!("heading_pattern is ignored by the structural strategy");
        }
        Ok(Self {
            level: config.heading_marker_count,
        })
    }

    fn finish(&self, doc: &SourceDocument, heading: OpenHeading) -> Option<Candidate> {
        let Some((ordinal, title)) = split_heading_text(&heading.text) else {
            debug!("Skipping unnumbered heading: {:?}", heading.text.trim());
            return None;
        };

        Some(Candidate {
            ordinal,
            title,
            raw_line: doc.line_at(heading.line_start).to_string(),
            offset: heading.line_start,
            line: doc.original_line(heading.line_start),
            strategy: Strategy::Structural,
        })
    }
}

impl Detector for StructuralDetector {
    fn detect(&self, doc: &SourceDocument) -> Result<Vec<Candidate>> {
        let text = doc.text();
        let mut candidates = Vec::new();
        let mut literal_depth = 0usize;
        let mut open: Option<OpenHeading> = None;

        for (event, range) in Parser::new_ext(text, Options::empty()).into_offset_iter() {
            match event {
                Event::Start(Tag::CodeBlock(_)) | Event::Start(Tag::HtmlBlock) => {
                    literal_depth += 1;
                }
                Event::End(TagEnd::CodeBlock) | Event::End(TagEnd::HtmlBlock) => {
                    literal_depth = literal_depth.saturating_sub(1);
                }
                Event::Start(Tag::Heading { level, .. }) => {
                    if literal_depth == 0 && level as usize == self.level {
                        let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
                        open = Some(OpenHeading {
                            line_start,
                            text: String::new(),
                        });
                    }
                }
                Event::Text(fragment) | Event::Code(fragment) => {
                    if let Some(heading) = open.as_mut() {
                        heading.text.push_str(&fragment);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some(heading) = open.as_mut() {
                        heading.text.push(' ');
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(heading) = open.take() {
                        candidates.extend(self.finish(doc, heading));
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Structural scan kept {} level-{} headings",
            candidates.len(),
            self.level
        );
        Ok(candidates)
    }

    fn strategy(&self) -> Strategy {
        Strategy::Structural
    }
}
