//! # Core Module
//!
//! Chat message types and environment configuration shared by every layer.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Message and conversation types
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod message;

pub use config::{Config, ConfigError, RelayFormat};
pub use message::{welcome_message, Conversation, Message, Role};
