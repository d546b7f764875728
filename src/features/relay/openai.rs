//! OpenAI-compatible chat completions client
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Server-sent event parsing for streamed completions
//! - 1.0.0: Non-streamed completions

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use super::backend::{BackendError, CompletionBackend, FragmentStream};
use crate::core::{Config, Message};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<CompletionChoice>,
}

#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_model,
            config.temperature,
            config.relay_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream,
        };

        let mut builder = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request);
        if !stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout.as_secs())
            } else {
                BackendError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_summary(&body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn stream_chat(&self, messages: &[Message]) -> Result<FragmentStream, BackendError> {
        debug!("Opening streamed completion | model: {} | messages: {}", self.model, messages.len());
        let response = self.send(messages, true).await?;
        Ok(sse_fragments(Box::pin(response.bytes_stream())))
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, BackendError> {
        debug!("Requesting completion | model: {} | messages: {}", self.model, messages.len());
        let response = self.send(messages, false).await?;
        let completion: Completion = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| BackendError::Malformed("no choices in completion".to_string()))
    }
}

/// One interpreted line of a server-sent event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Fragment(String),
    Done,
    Skip,
    Error(String),
}

pub fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
        return SseLine::Skip;
    };

    if payload == "[DONE]" {
        return SseLine::Done;
    }
    if payload.is_empty() {
        return SseLine::Skip;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseLine::Fragment)
            .unwrap_or(SseLine::Skip),
        Err(_) => SseLine::Error(error_summary(payload)),
    }
}

struct SseState<S> {
    bytes: S,
    buffer: Vec<u8>,
    ready: VecDeque<Result<String, BackendError>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn drain_lines(&mut self) {
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.handle_line(&line) {
                self.buffer.clear();
                return;
            }
        }
    }

    /// Returns true once the stream is over
    fn handle_line(&mut self, raw: &[u8]) -> bool {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("Skipping non UTF-8 line in completion stream: {e}");
                return false;
            }
        };

        match parse_sse_line(line) {
            SseLine::Fragment(text) => {
                self.ready.push_back(Ok(text));
                false
            }
            SseLine::Skip => false,
            SseLine::Done => {
                self.finished = true;
                true
            }
            SseLine::Error(message) => {
                self.ready.push_back(Err(BackendError::Stream(message)));
                self.finished = true;
                true
            }
        }
    }
}

/// Turn a raw byte stream of server-sent events into text fragments.
///
/// A network chunk may hold several events or a fraction of one; fragments
/// are released one per `data:` line, in order.
pub fn sse_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.ready.push_back(Err(BackendError::Stream(e.to_string())));
                }
                None => {
                    // Providers normally end with [DONE]; a final line without
                    // a newline still counts
                    state.finished = true;
                    if !state.buffer.is_empty() {
                        let rest = std::mem::take(&mut state.buffer);
                        state.handle_line(&rest);
                    }
                }
            }
        }
    })
    .boxed()
}

/// Condense a provider error body to one line
pub fn error_summary(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let summary = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .or_else(|| value.get("message").and_then(|v| v.as_str()));
        if let Some(text) = summary {
            return text.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }

    trimmed.chars().take(200).collect()
}
