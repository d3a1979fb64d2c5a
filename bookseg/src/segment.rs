//! Slicing the normalized text into chapter spans and writing them out.

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SplitConfig;
use crate::error::{Result, SegmentError};
use crate::text::SourceDocument;
use crate::validate::ValidatedBoundary;

/// A half-open byte range `[start, end)` of the normalized text.
///
/// Index 0 is the front matter before the first boundary; every other span
/// starts at an accepted boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterSpan {
    /// Dense sequence index, independent of the detected chapter number
    pub index: usize,
    pub start: usize,
    pub end: usize,
    /// The boundary that opened this span; `None` for front matter
    pub boundary: Option<ValidatedBoundary>,
}

impl ChapterSpan {
    pub fn is_front_matter(&self) -> bool {
        self.boundary.is_none()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text<'a>(&self, doc: &'a SourceDocument) -> &'a str {
        &doc.text()[self.start..self.end]
    }

    pub fn ordinal(&self) -> Option<u32> {
        self.boundary.as_ref().and_then(|b| b.candidate.ordinal)
    }

    pub fn title(&self) -> Option<&str> {
        self.boundary.as_ref().map(|b| b.candidate.title.as_str())
    }
}

/// Cut the document at each accepted boundary.
///
/// `accepted` must be the passing boundaries in document order. The spans
/// cover the whole document with no gaps or overlaps; the front-matter span
/// is always present, even when empty.
pub fn segment(doc: &SourceDocument, accepted: &[ValidatedBoundary]) -> Result<Vec<ChapterSpan>> {
    let text = doc.text();
    let mut previous: Option<usize> = None;

    for boundary in accepted {
        let offset = boundary.offset();
        let out_of_order = previous.is_some_and(|prev| offset <= prev);
        if out_of_order || offset > text.len() || !text.is_char_boundary(offset) {
            return Err(SegmentError::InternalConsistency {
                previous: previous.unwrap_or(0),
                offset,
            });
        }
        previous = Some(offset);
    }

    let mut spans = Vec::with_capacity(accepted.len() + 1);
    let first_cut = accepted.first().map_or(text.len(), ValidatedBoundary::offset);
    spans.push(ChapterSpan {
        index: 0,
        start: 0,
        end: first_cut,
        boundary: None,
    });

    for (i, boundary) in accepted.iter().enumerate() {
        let end = accepted
            .get(i + 1)
            .map_or(text.len(), ValidatedBoundary::offset);
        spans.push(ChapterSpan {
            index: i + 1,
            start: boundary.offset(),
            end,
            boundary: Some(boundary.clone()),
        });
    }

    debug!("Segmented {} bytes into {} spans", text.len(), spans.len());
    Ok(spans)
}

/// File name for a span: `<prefix>-<NN>[.<ext>]`.
///
/// Padding is two digits, or wider when the last index needs more.
pub fn file_name(index: usize, span_count: usize, prefix: &str, extension: &str) -> String {
    let last = span_count.saturating_sub(1);
    let width = last.to_string().len().max(2);
    if extension.is_empty() {
        format!("{prefix}-{index:0width$}")
    } else {
        format!("{prefix}-{index:0width$}.{extension}")
    }
}

/// Write every span to its own file under `dir`.
///
/// The directory is created first. Without `overwrite`, an existing target
/// aborts the write before any file is created.
pub fn write_chapters(
    doc: &SourceDocument,
    spans: &[ChapterSpan],
    dir: &Path,
    config: &SplitConfig,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let paths: Vec<PathBuf> = spans
        .iter()
        .map(|span| {
            dir.join(file_name(
                span.index,
                spans.len(),
                &config.file_prefix,
                &config.file_extension,
            ))
        })
        .collect();

    if !overwrite {
        if let Some(existing) = paths.iter().find(|p| p.exists()) {
            return Err(SegmentError::OutputExists(existing.clone()));
        }
    }

    spans
        .par_iter()
        .zip(paths.par_iter())
        .try_for_each(|(span, path)| write_span(span.text(doc), path, overwrite))?;

    info!("Wrote {} chapter files to {}", paths.len(), dir.display());
    Ok(paths)
}

fn write_span(text: &str, path: &Path, overwrite: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            SegmentError::OutputExists(path.to_path_buf())
        } else {
            SegmentError::Io(e)
        }
    })?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
