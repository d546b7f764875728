//! Follow-up question generation for the /suggestions endpoint
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.1.0: Bullet and line heuristics before falling back to defaults
//! - 1.0.0: Initial release

use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::extractor::{extract_with, SuggestionFormat};
use super::parsers::{parse_with, ParseResult, GENERATED_STRATEGIES};
use crate::core::Message;
use crate::features::relay::CompletionBackend;

/// Returned whenever nothing better can be found
pub const DEFAULT_SUGGESTIONS: [&str; 5] = [
    "What is your greatest teaching?",
    "How did you find your calling?",
    "What challenges did you face?",
    "What advice would you give me?",
    "Tell me about your spiritual journey",
];

const GENERATOR_PROMPT: &str = "You are a helpful assistant that generates follow-up questions based on a conversation with a Catholic saint. Generate 3-5 thoughtful questions that would help the user learn more about the saint's life, teachings, or spiritual insights. Answer with a JSON array of strings only.";

pub fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Where a set of suggestions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    /// Embedded in the assistant message itself
    Embedded,
    /// A separate generator request
    Generated,
    Default,
}

#[derive(Clone)]
pub struct SuggestionService {
    backend: Arc<dyn CompletionBackend>,
}

impl SuggestionService {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Suggestions for a prior assistant message. Never fails and never
    /// returns an empty list.
    pub async fn suggest(&self, content: &str) -> Vec<String> {
        self.suggest_with_source(content).await.0
    }

    pub async fn suggest_with_source(&self, content: &str) -> (Vec<String>, SuggestionSource) {
        let request_id = Uuid::new_v4();

        if let Some(embedded) = embedded_suggestions(content) {
            debug!("[{request_id}] Using {} suggestions embedded in message", embedded.len());
            return (embedded, SuggestionSource::Embedded);
        }

        let messages = vec![
            Message::system(GENERATOR_PROMPT),
            Message::user(format!(
                "Based on this message from a saint, generate 3-5 follow-up questions that a user might want to ask: \"{content}\""
            )),
        ];

        let generated = match self.backend.complete(&messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!("[{request_id}] Suggestion generation failed, using defaults: {e}");
                return (default_suggestions(), SuggestionSource::Default);
            }
        };

        match parse_with(GENERATED_STRATEGIES, &generated) {
            ParseResult::Parsed {
                strategy,
                suggestions,
            } => {
                info!(
                    "[{request_id}] Generated {} suggestions via {}",
                    suggestions.len(),
                    strategy.name()
                );
                (suggestions, SuggestionSource::Generated)
            }
            ParseResult::Unparsed => {
                warn!(
                    "[{request_id}] Could not parse generated suggestions, using defaults: {}",
                    generated.chars().take(100).collect::<String>()
                );
                (default_suggestions(), SuggestionSource::Default)
            }
        }
    }
}

/// Questions the model already embedded, in either supported format
fn embedded_suggestions(content: &str) -> Option<Vec<String>> {
    extract_with(content, SuggestionFormat::Delimited)
        .suggestions
        .or_else(|| extract_with(content, SuggestionFormat::BareArray).suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::relay::BackendError;
    use crate::testing::ScriptedBackend;

    fn service(backend: ScriptedBackend) -> (SuggestionService, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        (SuggestionService::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_embedded_block_used_without_backend_call() {
        let (service, backend) = service(ScriptedBackend::fragments(&[]));
        let (suggestions, source) = service
            .suggest_with_source("Peace. [SUGGESTIONS_START][\"Why?\"][SUGGESTIONS_END]")
            .await;
        assert_eq!(suggestions, vec!["Why?"]);
        assert_eq!(source, SuggestionSource::Embedded);
        assert!(backend.completion_requests().is_empty());
    }

    #[tokio::test]
    async fn test_embedded_bare_array() {
        let (service, _) = service(ScriptedBackend::fragments(&[]));
        let suggestions = service
            .suggest(r#"Peace. ["How did you pray?", "Who taught you?"]"#)
            .await;
        assert_eq!(suggestions, vec!["How did you pray?", "Who taught you?"]);
    }

    #[tokio::test]
    async fn test_generated_json() {
        let (service, backend) = service(
            ScriptedBackend::fragments(&[])
                .with_completion(Ok(r#"["What is grace?", "How did you pray?", "Why Hippo?"]"#)),
        );
        let (suggestions, source) = service.suggest_with_source("I was a sinner.").await;
        assert_eq!(suggestions, vec!["What is grace?", "How did you pray?", "Why Hippo?"]);
        assert_eq!(source, SuggestionSource::Generated);

        let requests = backend.completion_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0][0].is_system());
        assert!(requests[0][1].content.contains("I was a sinner."));
    }

    #[tokio::test]
    async fn test_generated_bullets() {
        let (service, _) = service(ScriptedBackend::fragments(&[]).with_completion(Ok(
            "Here are some questions:\n1. What is grace?\n2. How did you pray?",
        )));
        let suggestions = service.suggest("I was a sinner.").await;
        assert_eq!(suggestions, vec!["What is grace?", "How did you pray?"]);
    }

    #[tokio::test]
    async fn test_unparseable_generation_falls_back_to_defaults() {
        let (service, _) = service(
            ScriptedBackend::fragments(&[]).with_completion(Ok("I cannot help with that.")),
        );
        let (suggestions, source) = service.suggest_with_source("Hello").await;
        assert_eq!(suggestions, default_suggestions());
        assert_eq!(source, SuggestionSource::Default);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_to_defaults() {
        let (service, _) = service(
            ScriptedBackend::fragments(&[])
                .with_completion(Err(BackendError::Request("connection refused".to_string()))),
        );
        let suggestions = service.suggest("Hello").await;
        assert_eq!(suggestions.len(), 5);
        assert_eq!(suggestions, default_suggestions());
    }
}
