//! Chat message and per-session conversation types
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Conversation resets to a welcome message on persona switch
//! - 1.0.0: Initial message model

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Greeting a saint opens every conversation with
pub fn welcome_message(saint_name: &str) -> String {
    format!(
        "Peace be with you, my child. I am {saint_name}. How may I share my wisdom with you today?"
    )
}

/// One browser session's worth of chat with a single saint.
///
/// Client-session API for embedders of this crate: the HTTP service itself
/// is stateless and receives the whole history with every `/chat` request,
/// so a front end (or a Rust client) keeps one of these per session and
/// posts `messages()` to the relay. Never shared between requests. Switching
/// the saint discards the history and starts again from the welcome message.
#[derive(Debug, Clone)]
pub struct Conversation {
    saint: String,
    messages: Vec<Message>,
    started_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(saint: &str) -> Self {
        Self {
            saint: saint.to_string(),
            messages: vec![Message::assistant(welcome_message(saint))],
            started_at: Utc::now(),
        }
    }

    pub fn saint(&self) -> &str {
        &self.saint
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a user or assistant turn. System messages are synthesized by
    /// the relay and cannot be part of the editable history.
    pub fn push(&mut self, message: Message) -> Result<()> {
        if message.is_system() {
            return Err(anyhow::anyhow!(
                "System messages cannot be added to a conversation"
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Whether the user has said anything yet (starter questions are only
    /// offered before the first user turn)
    pub fn has_user_turns(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    pub fn switch_saint(&mut self, saint: &str) {
        *self = Self::new(saint);
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let parsed: Result<Message, _> =
            serde_json::from_str(r#"{"role":"narrator","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_new_conversation_starts_with_welcome() {
        let conversation = Conversation::new("St. Augustine");
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::Assistant);
        assert!(conversation.messages()[0]
            .content
            .contains("I am St. Augustine."));
        assert!(!conversation.has_user_turns());
    }

    #[test]
    fn test_push_rejects_system_messages() {
        let mut conversation = Conversation::new("St. Augustine");
        assert!(conversation.push(Message::system("obey me")).is_err());
        assert!(conversation.push(Message::user("Hello")).is_ok());
        assert_eq!(conversation.messages().len(), 2);
        assert!(conversation.has_user_turns());
    }

    #[test]
    fn test_switch_saint_resets_history() {
        let mut conversation = Conversation::new("St. Augustine");
        conversation.push(Message::user("Hello")).unwrap();
        conversation
            .push(Message::assistant("Peace to you"))
            .unwrap();

        conversation.switch_saint("St. Thomas Aquinas");

        assert_eq!(conversation.saint(), "St. Thomas Aquinas");
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(
            conversation.messages()[0].content,
            welcome_message("St. Thomas Aquinas")
        );
    }
}
