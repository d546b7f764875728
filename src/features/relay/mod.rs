//! # Feature: Completion Relay
//!
//! Forwards a conversation to the text-generation backend and republishes
//! its token stream fragment by fragment.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Suggestion stripping inside the stream
//! - 1.1.0: Backend trait, OpenAI-compatible SSE client
//! - 1.0.0: Initial release

pub mod backend;
pub mod engine;
pub mod openai;

pub use backend::{BackendError, CompletionBackend, FragmentStream};
pub use engine::{Relay, RelayError, RelayEvent, RelayOptions, RelayState, RelayStream};
pub use openai::OpenAiBackend;
