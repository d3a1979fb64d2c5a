//! Source normalization: OCR artifact repair and offset translation.

mod line_map;
mod normalizer;

pub use line_map::{LineBreakpoint, LineMap};
pub use normalizer::{expand_ligatures, join_hyphenated_lines, strip_trailing_page_number};

use log::debug;
use serde::Serialize;

/// Counts of the repairs applied while normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub ligatures_expanded: usize,
    pub hyphen_joins: usize,
    pub page_numbers_stripped: usize,
}

/// Normalized book text plus the map back to source line numbers.
///
/// Built once per run by [`normalize`] and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    text: String,
    /// Byte offset of every normalized line start, ascending
    line_starts: Vec<usize>,
    line_map: LineMap,
    stats: NormalizationStats,
}

impl SourceDocument {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn stats(&self) -> NormalizationStats {
        self.stats
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    /// 1-based source line of a 0-based normalized line.
    pub fn original_line_at(&self, normalized_line: usize) -> usize {
        self.line_map.original_line(normalized_line)
    }

    /// 0-based normalized line containing the byte `offset`.
    pub fn line_index(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// 1-based source line containing the normalized byte `offset`.
    pub fn original_line(&self, offset: usize) -> usize {
        self.line_map.original_line(self.line_index(offset))
    }

    /// The full line (without its terminator) starting at `offset`.
    pub fn line_at(&self, offset: usize) -> &str {
        let rest = &self.text[offset..];
        let line = rest.split('\n').next().unwrap_or_default();
        line.strip_suffix('\r').unwrap_or(line)
    }
}

/// Repair OCR artifacts that corrupt chapter headings.
///
/// Steps run in a fixed order: ligature expansion, hyphenated line-break
/// rejoining, then trailing page-number stripping on heading lines.
/// Applying it to its own output changes nothing.
pub fn normalize(raw: &str) -> SourceDocument {
    if raw.is_empty() {
        return SourceDocument::default();
    }

    let (expanded, ligatures_expanded) = expand_ligatures(raw);

    let lines: Vec<&str> = expanded.split('\n').collect();
    let joined = join_hyphenated_lines(&lines);

    let mut page_numbers_stripped = 0;
    let cleaned: Vec<String> = joined
        .lines
        .iter()
        .map(|line| {
            let (line, stripped) = strip_trailing_page_number(line);
            page_numbers_stripped += stripped;
            line
        })
        .collect();

    let stats = NormalizationStats {
        ligatures_expanded,
        hyphen_joins: joined.joins,
        page_numbers_stripped,
    };
    debug!("Normalized {} source lines: {:?}", lines.len(), stats);

    let text = cleaned.join("\n");
    let line_starts = std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    SourceDocument {
        text,
        line_starts,
        line_map: LineMap::from_line_starts(&joined.starts),
        stats,
    }
}
