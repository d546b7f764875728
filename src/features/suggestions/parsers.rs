//! Ordered parser strategies for follow-up question lists
//!
//! Model output is loosely structured, so parsing is a chain of strategies
//! tried in order. Each strategy either produces a non-empty list or
//! declines; the first success wins.

use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on suggestions returned from any strategy
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserStrategy {
    /// Strict JSON array of strings, taken from the first `[` to its
    /// matching `]`
    JsonArray,
    /// Every double-quoted substring
    QuotedStrings,
    /// Lines starting with `-`, `*`, `•` or `1.` / `1)`
    BulletList,
    /// Any non-empty line that reads like a question
    QuestionLines,
}

/// Strategies for a span already known to be a suggestion block
pub const BLOCK_STRATEGIES: &[ParserStrategy] =
    &[ParserStrategy::JsonArray, ParserStrategy::QuotedStrings];

/// Strategies for free-form model output from the generator request
pub const GENERATED_STRATEGIES: &[ParserStrategy] = &[
    ParserStrategy::JsonArray,
    ParserStrategy::BulletList,
    ParserStrategy::QuestionLines,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Parsed {
        strategy: ParserStrategy,
        suggestions: Vec<String>,
    },
    Unparsed,
}

impl ParseResult {
    pub fn into_suggestions(self) -> Option<Vec<String>> {
        match self {
            ParseResult::Parsed { suggestions, .. } => Some(suggestions),
            ParseResult::Unparsed => None,
        }
    }
}

impl ParserStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ParserStrategy::JsonArray => "json_array",
            ParserStrategy::QuotedStrings => "quoted_strings",
            ParserStrategy::BulletList => "bullet_list",
            ParserStrategy::QuestionLines => "question_lines",
        }
    }

    pub fn parse(&self, text: &str) -> Option<Vec<String>> {
        let items = match self {
            ParserStrategy::JsonArray => parse_json_array(text),
            ParserStrategy::QuotedStrings => parse_quoted(text),
            ParserStrategy::BulletList => parse_bullets(text),
            ParserStrategy::QuestionLines => parse_question_lines(text),
        }?;
        normalize(items)
    }
}

/// Run strategies in order and tag the result with the one that succeeded
pub fn parse_with(strategies: &[ParserStrategy], text: &str) -> ParseResult {
    for strategy in strategies {
        if let Some(suggestions) = strategy.parse(text) {
            return ParseResult::Parsed {
                strategy: *strategy,
                suggestions,
            };
        }
    }
    ParseResult::Unparsed
}

/// Strictly parse `text` as a JSON array of strings
pub fn parse_string_array(text: &str) -> Option<Vec<String>> {
    // Typed target fails at the first non-string element
    serde_json::from_str(text.trim()).ok()
}

/// Every closed `[`..`]` pair in `text`, ordered by opening position, found
/// in a single pass. Quotes only count as JSON strings inside brackets, so
/// prose quotation marks do not hide an array.
pub fn bracket_pairs(text: &str) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !stack.is_empty() => in_string = true,
            b'[' => stack.push(i),
            b']' => {
                if let Some(open) = stack.pop() {
                    pairs.push((open, i));
                }
            }
            _ => {}
        }
    }

    pairs.sort_unstable();
    pairs
}

/// Byte range of the bracket that closes the `[` at `open`, honouring JSON
/// string quoting
pub fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json_array(text: &str) -> Option<Vec<String>> {
    let open = text.find('[')?;
    let close = matching_bracket(text, open)?;
    parse_string_array(&text[open..=close])
}

fn quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid quoted-string regex"))
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid bullet regex")
    })
}

fn parse_quoted(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = quoted_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\""))
        .collect();
    Some(items)
}

fn parse_bullets(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = text
        .lines()
        .filter_map(|line| bullet_regex().captures(line))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    Some(items)
}

fn parse_question_lines(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.ends_with('?'))
        .map(str::to_string)
        .collect();
    Some(items)
}

/// Trim quotes and whitespace, drop empties and duplicates, cap the count.
/// Declines when nothing is left.
fn normalize(items: Vec<String>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let cleaned = item
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string();
        if !cleaned.is_empty() && !out.contains(&cleaned) {
            out.push(cleaned);
        }
    }
    out.truncate(MAX_SUGGESTIONS);
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
