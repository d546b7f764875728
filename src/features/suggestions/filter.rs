//! Incremental suggestion-block stripping for streamed output
//!
//! Text is released as soon as it cannot be the start of a
//! `[SUGGESTIONS_START]` marker. Only a possible marker prefix, or the
//! inside of an open block, is held back.

use super::extractor::{parse_block, partial_marker_len, END_MARKER, START_MARKER};

#[derive(Debug, Default)]
pub struct SuggestionFilter {
    pending: String,
    in_block: bool,
    suggestions: Vec<String>,
}

impl SuggestionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment, returning the text that is safe to show now
    /// (possibly empty)
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let mut visible = String::new();

        loop {
            if self.in_block {
                let Some(end) = self.pending.find(END_MARKER) else {
                    break;
                };
                if let Some(items) = parse_block(&self.pending[..end]) {
                    for item in items {
                        if !self.suggestions.contains(&item) {
                            self.suggestions.push(item);
                        }
                    }
                }
                self.pending.drain(..end + END_MARKER.len());
                self.in_block = false;
            } else if let Some(start) = self.pending.find(START_MARKER) {
                visible.push_str(&self.pending[..start]);
                self.pending.drain(..start + START_MARKER.len());
                self.in_block = true;
            } else {
                let held = partial_marker_len(&self.pending);
                let release = self.pending.len() - held;
                visible.push_str(&self.pending[..release]);
                self.pending.drain(..release);
                break;
            }
        }

        visible
    }

    /// Suggestions parsed since the last call
    pub fn take_suggestions(&mut self) -> Option<Vec<String>> {
        if self.suggestions.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.suggestions))
        }
    }

    /// End of stream. An open block or a marker prefix of two or more
    /// characters is dropped as truncated markup; anything else is released.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        if self.in_block {
            self.in_block = false;
            return String::new();
        }
        if partial_marker_len(&rest) >= 2 {
            String::new()
        } else {
            rest
        }
    }
}
