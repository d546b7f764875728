//! # Features Layer
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Relay and suggestions replace the chat bot features
//! - 1.0.0: Initial layout

pub mod personas;
pub mod relay;
pub mod suggestions;

pub use personas::{build_system_prompt, PromptBuilder, Saint, SaintCatalog, DEFAULT_SAINT};
pub use relay::{
    BackendError, CompletionBackend, OpenAiBackend, Relay, RelayError, RelayEvent, RelayOptions,
};
pub use suggestions::{extract_suggestions, SuggestionFilter, SuggestionService};
