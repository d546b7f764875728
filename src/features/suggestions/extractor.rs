//! Suggestion block extraction from a finished assistant turn
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.1.0: Always strip blocks, even when their content does not parse
//! - 1.0.0: Delimited and bare-array formats

use super::parsers::{self, ParseResult, BLOCK_STRATEGIES, MAX_SUGGESTIONS};

pub const START_MARKER: &str = "[SUGGESTIONS_START]";
pub const END_MARKER: &str = "[SUGGESTIONS_END]";

/// Shortest trailing fragment of [`START_MARKER`] treated as a truncated block
const MIN_PARTIAL_MARKER: usize = 2;

/// How the model was asked to embed follow-up questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestionFormat {
    /// `[SUGGESTIONS_START] [...] [SUGGESTIONS_END]`
    #[default]
    Delimited,
    /// A bare JSON array of strings anywhere in the text
    BareArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub cleaned_text: String,
    pub suggestions: Option<Vec<String>>,
}

/// Extract delimited suggestion blocks from `raw`.
///
/// Every block is removed from the visible text whether or not its content
/// parses, as is a block cut off by stream truncation. Applying this to its
/// own `cleaned_text` finds nothing.
pub fn extract_suggestions(raw: &str) -> Extraction {
    extract_with(raw, SuggestionFormat::Delimited)
}

pub fn extract_with(raw: &str, format: SuggestionFormat) -> Extraction {
    let (cleaned, found) = match format {
        SuggestionFormat::Delimited => strip_delimited(raw),
        SuggestionFormat::BareArray => strip_bare_arrays(raw),
    };

    Extraction {
        cleaned_text: cleaned.trim().to_string(),
        suggestions: collect(found),
    }
}

/// Parse the inside of one delimited block
pub fn parse_block(inner: &str) -> Option<Vec<String>> {
    match parsers::parse_with(BLOCK_STRATEGIES, inner) {
        ParseResult::Parsed { suggestions, .. } => Some(suggestions),
        ParseResult::Unparsed => None,
    }
}

/// Length of the longest proper prefix of [`START_MARKER`] that `text` ends
/// with (0 when none)
pub fn partial_marker_len(text: &str) -> usize {
    (1..START_MARKER.len())
        .rev()
        .find(|&k| text.ends_with(&START_MARKER[..k]))
        .unwrap_or(0)
}

/// Drop a truncated start marker left at the very end of the text
pub fn strip_partial_marker(text: &str) -> &str {
    let mut current = text;
    loop {
        let trimmed = current.trim_end();
        let k = partial_marker_len(trimmed);
        if k < MIN_PARTIAL_MARKER {
            return current;
        }
        current = &trimmed[..trimmed.len() - k];
    }
}

fn strip_delimited(raw: &str) -> (String, Vec<Vec<String>>) {
    let mut cleaned = String::with_capacity(raw.len());
    let mut found = Vec::new();
    let mut rest = raw;

    // `cleaned` never holds a complete marker: each one is removed as soon as
    // its closing bracket lands, including markers formed by a removal.
    while let Some(c) = rest.chars().next() {
        cleaned.push(c);
        rest = &rest[c.len_utf8()..];
        if c != ']' {
            continue;
        }

        if cleaned.ends_with(END_MARKER) {
            // Orphan end marker
            cleaned.truncate(cleaned.len() - END_MARKER.len());
        } else if cleaned.ends_with(START_MARKER) {
            cleaned.truncate(cleaned.len() - START_MARKER.len());
            match rest.find(END_MARKER) {
                Some(end) => {
                    if let Some(items) = parse_block(&rest[..end]) {
                        found.push(items);
                    }
                    rest = &rest[end + END_MARKER.len()..];
                }
                // Unterminated block: everything after the marker is markup
                None => rest = "",
            }
        }
    }

    let kept = strip_partial_marker(&cleaned).len();
    cleaned.truncate(kept);
    (cleaned, found)
}

fn strip_bare_arrays(raw: &str) -> (String, Vec<Vec<String>>) {
    let mut cleaned = String::with_capacity(raw.len());
    let mut found = Vec::new();
    let mut cursor = 0;

    for (open, close) in parsers::bracket_pairs(raw) {
        if open < cursor || !starts_string_array(&raw[open + 1..close]) {
            continue;
        }
        if let Some(items) =
            parsers::parse_string_array(&raw[open..=close]).filter(|items| !items.is_empty())
        {
            cleaned.push_str(&raw[cursor..open]);
            found.push(items);
            cursor = close + 1;
        }
    }
    cleaned.push_str(&raw[cursor..]);
    (cleaned, found)
}

/// Cheap check before a full parse: a non-empty string array opens with `"`
fn starts_string_array(inner: &str) -> bool {
    inner.trim_start().starts_with('"')
}

fn collect(found: Vec<Vec<String>>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for item in found.into_iter().flatten() {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out.truncate(MAX_SUGGESTIONS);
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
