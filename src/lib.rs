// Core layer - message types and configuration
pub mod core;

// Features layer - personas, relay, suggestions
pub mod features;

// HTTP layer - axum router and handlers
pub mod server;

#[cfg(test)]
pub mod testing;

pub use core::{Config, Conversation, Message, Role};
pub use features::{Relay, SaintCatalog, SuggestionService};
pub use server::{router, serve, AppState};
