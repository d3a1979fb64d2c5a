//! Translation from normalized line numbers back to source line numbers.

use serde::Serialize;

/// A point where the normalized/source line shift changes.
///
/// Normalized line `normalized` (0-based) begins on source line `original`
/// (0-based); following lines keep the same shift until the next breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineBreakpoint {
    pub normalized: usize,
    pub original: usize,
}

/// Sorted breakpoints, one per hyphen join, searched with binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    breakpoints: Vec<LineBreakpoint>,
}

impl LineMap {
    /// Build from the source line each normalized line started on.
    ///
    /// `starts[i]` is the 0-based source line of normalized line `i`; the
    /// sequence must be strictly increasing.
    pub fn from_line_starts(starts: &[usize]) -> Self {
        let mut breakpoints = Vec::new();
        let mut shift = 0usize;

        for (normalized, &original) in starts.iter().enumerate() {
            let current = original - normalized;
            if current != shift {
                breakpoints.push(LineBreakpoint {
                    normalized,
                    original,
                });
                shift = current;
            }
        }

        Self { breakpoints }
    }

    /// 1-based source line for a 0-based normalized line.
    pub fn original_line(&self, normalized_line: usize) -> usize {
        let idx = self
            .breakpoints
            .partition_point(|bp| bp.normalized <= normalized_line);

        let original = match idx {
            0 => normalized_line,
            _ => {
                let bp = self.breakpoints[idx - 1];
                bp.original + (normalized_line - bp.normalized)
            }
        };

        original + 1
    }

    pub fn breakpoints(&self) -> &[LineBreakpoint] {
        &self.breakpoints
    }

    pub fn is_identity(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
