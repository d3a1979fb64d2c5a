//! OCR artifact repair ahead of boundary detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ligature glyphs and their expansions.
const LIGATURES: &[(char, &str)] = &[
    ('\u{fb00}', "ff"),  // ﬀ
    ('\u{fb01}', "fi"),  // ﬁ
    ('\u{fb02}', "fl"),  // ﬂ
    ('\u{fb03}', "ffi"), // ﬃ
    ('\u{fb04}', "ffl"), // ﬄ
    ('\u{fb05}', "st"),  // ﬅ (long s + t)
    ('\u{fb06}', "st"),  // ﬆ
    ('\u{0132}', "IJ"),  // Ĳ
    ('\u{0133}', "ij"),  // ĳ
];

/// Heading line ending in a page number: `## 4 Memory Management   117`.
///
/// The kept head never ends in whitespace or a hyphen, so stripping can't
/// set up a hyphen join that an earlier pass missed.
static TRAILING_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<head>[ \t]{0,3}#{1,6}[ \t]+\d+[ \t]+.*[^\s-])[ \t]+\d{1,4}[ \t]*(?P<cr>\r?)$")
        .expect("page number pattern is valid")
});

/// Replace ligature glyphs with their letters.
///
/// Returns the expanded text and the number of glyphs replaced.
pub fn expand_ligatures(text: &str) -> (String, usize) {
    let mut result = String::with_capacity(text.len());
    let mut replaced = 0;

    for c in text.chars() {
        match LIGATURES.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, expansion)) => {
                result.push_str(expansion);
                replaced += 1;
            }
            None => result.push(c),
        }
    }

    (result, replaced)
}

/// Lines after hyphen rejoining, with the source line each one started on.
#[derive(Debug, Default)]
pub struct JoinedLines {
    pub lines: Vec<String>,
    pub starts: Vec<usize>,
    pub joins: usize,
}

/// Rejoin words that OCR justification split across lines.
///
/// A line ending in `<letter>-` followed by a line starting with a lowercase
/// letter is merged with it. Joins chain, so a word split over three lines
/// ends up whole.
pub fn join_hyphenated_lines(lines: &[&str]) -> JoinedLines {
    let mut joined = JoinedLines {
        lines: Vec::with_capacity(lines.len()),
        starts: Vec::with_capacity(lines.len()),
        joins: 0,
    };

    let Some((first, rest)) = lines.split_first() else {
        return joined;
    };

    let mut current = first.to_string();
    let mut start = 0;

    for (offset, next) in rest.iter().enumerate() {
        if let Some(merged) = try_join(&current, next) {
            current = merged;
            joined.joins += 1;
            continue;
        }

        joined.lines.push(std::mem::take(&mut current));
        joined.starts.push(start);
        current = next.to_string();
        start = offset + 1;
    }

    joined.lines.push(current);
    joined.starts.push(start);
    joined
}

/// Merge `current` and `next` if they form a hyphen-broken word.
fn try_join(current: &str, next: &str) -> Option<String> {
    let stem = current.trim_end().strip_suffix('-')?;
    if !stem.chars().last().is_some_and(char::is_alphabetic) {
        return None;
    }

    let right = next.trim_start();
    if !right.chars().next().is_some_and(char::is_lowercase) {
        return None;
    }

    // Alphabetic run directly before the hyphen
    let fragment_start = stem
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_alphabetic())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let fragment = &stem[fragment_start..];

    let continuation = if repeats_capital_syllable(fragment, right) {
        &right[fragment.len()..]
    } else {
        right
    };

    Some(format!("{stem}{continuation}"))
}

/// Longest fragment treated as a repeated syllable.
const MAX_REPEATED_SYLLABLE: usize = 2;

/// OCR sometimes repeats a capitalized word's first syllable in lowercase on
/// the next line ("Ar-" / "architecture").
///
/// Only a two-letter capitalized fragment qualifies; lowercase doubling
/// (`mur-` / `mur`, `re-` / `reading`) and longer fragments (`Bar-` / `bara`)
/// are real words and join by plain concatenation.
fn repeats_capital_syllable(fragment: &str, right: &str) -> bool {
    let mut chars = fragment.chars();
    let capitalized = chars.next().is_some_and(char::is_uppercase) && chars.all(char::is_lowercase);
    if !capitalized || fragment.chars().count() != MAX_REPEATED_SYLLABLE {
        return false;
    }

    let word: &str = right
        .split(|c: char| !c.is_alphabetic())
        .next()
        .unwrap_or_default();
    word.len() > fragment.len()
        && word.chars().all(char::is_lowercase)
        && word
            .get(..fragment.len())
            .is_some_and(|prefix| prefix == fragment.to_lowercase())
}

/// Strip page numbers that bled into the end of a heading line.
///
/// Returns the cleaned line and how many numbers were removed. Repeats
/// until no trailing number remains, so a second pass is a no-op.
pub fn strip_trailing_page_number(line: &str) -> (String, usize) {
    let mut line = line.to_string();
    let mut stripped = 0;

    while let Some(caps) = TRAILING_PAGE_NUMBER.captures(&line) {
        line = format!("{}{}", &caps["head"], &caps["cr"]);
        stripped += 1;
    }

    (line, stripped)
}
