//! # Personas Feature
//!
//! Saint catalog and the system prompt each saint speaks from.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Saint catalog replaces the generic persona table
//! - 1.0.0: Initial release

pub mod catalog;
pub mod prompt_builder;

pub use catalog::{Saint, SaintCatalog, DEFAULT_SAINT, STARTER_QUESTIONS};
pub use prompt_builder::{build_system_prompt, PromptBuilder};
