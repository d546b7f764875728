//! # Feature: Follow-up Suggestions
//!
//! Pulls suggested follow-up questions out of model output, strips the
//! markup from what the user sees, and generates fresh questions when the
//! model did not embed any.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.3.0
//! - **Toggleable**: true (STRIP_SUGGESTIONS controls stream filtering)
//!
//! ## Changelog
//! - 1.2.0: Streaming filter for the chat relay
//! - 1.1.0: Generator with default question fallback
//! - 1.0.0: Block extraction

pub mod extractor;
pub mod filter;
pub mod generator;
pub mod parsers;

pub use extractor::{extract_suggestions, extract_with, Extraction, SuggestionFormat};
pub use filter::SuggestionFilter;
pub use generator::{default_suggestions, SuggestionService, SuggestionSource, DEFAULT_SUGGESTIONS};
pub use parsers::{parse_with, ParseResult, ParserStrategy};
