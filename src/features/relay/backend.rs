//! Text-generation backend abstraction
//!
//! The relay and the suggestion generator only see this trait, so the hosted
//! provider can be swapped or scripted in tests.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::core::Message;

/// Incremental text fragments in arrival order
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Could not reach the backend, or the request could not be sent
    #[error("backend request failed: {0}")]
    Request(String),
    /// The backend answered with a non-success status
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The stream broke after it had started
    #[error("backend stream interrupted: {0}")]
    Stream(String),
    /// The backend answered but the payload was not understood
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("backend request timed out after {0} seconds")]
    Timeout(u64),
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a streamed completion. Errors before the first byte of the
    /// stream are returned here; later failures arrive as stream items.
    async fn stream_chat(&self, messages: &[Message]) -> Result<FragmentStream, BackendError>;

    /// Single non-streamed completion
    async fn complete(&self, messages: &[Message]) -> Result<String, BackendError>;
}
