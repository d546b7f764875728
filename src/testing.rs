//! Scripted backend for relay, suggestion and router tests

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::core::Message;
use crate::features::relay::{BackendError, CompletionBackend, FragmentStream};

enum Script {
    Fragments(Vec<String>),
    Fail(BackendError),
    Interrupted(Vec<String>, String),
    Stalled(Vec<String>),
    Endless,
    Unresponsive,
}

pub struct ScriptedBackend {
    script: Script,
    completion: Result<String, BackendError>,
    requests: Mutex<Vec<Vec<Message>>>,
    completions: Mutex<Vec<Vec<Message>>>,
    upstream_dropped: Arc<Notify>,
}

struct DropSignal(Arc<Notify>);

impl DropSignal {
    /// Ties the signal's lifetime to the closure that calls it
    fn keep_alive(&self) {}
}

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

fn owned(fragments: &[&str]) -> Vec<String> {
    fragments.iter().map(|s| s.to_string()).collect()
}

impl ScriptedBackend {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            completion: Err(BackendError::Request("no completion scripted".to_string())),
            requests: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            upstream_dropped: Arc::new(Notify::new()),
        }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::with_script(Script::Fragments(owned(fragments)))
    }

    pub fn failing(error: BackendError) -> Self {
        Self::with_script(Script::Fail(error))
    }

    pub fn interrupted(fragments: &[&str], reason: &str) -> Self {
        Self::with_script(Script::Interrupted(owned(fragments), reason.to_string()))
    }

    /// Yields the fragments, then never finishes
    pub fn stalled(fragments: &[&str]) -> Self {
        Self::with_script(Script::Stalled(owned(fragments)))
    }

    pub fn endless() -> Self {
        Self::with_script(Script::Endless)
    }

    /// `stream_chat` never returns
    pub fn unresponsive() -> Self {
        Self::with_script(Script::Unresponsive)
    }

    pub fn with_completion(mut self, completion: Result<&str, BackendError>) -> Self {
        self.completion = completion.map(str::to_string);
        self
    }

    pub fn last_request(&self) -> Option<Vec<Message>> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn completion_requests(&self) -> Vec<Vec<Message>> {
        self.completions.lock().unwrap().clone()
    }

    pub async fn wait_for_upstream_drop(&self) {
        self.upstream_dropped.notified().await;
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream_chat(&self, messages: &[Message]) -> Result<FragmentStream, BackendError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let base: FragmentStream = match &self.script {
            Script::Fail(error) => return Err(error.clone()),
            Script::Unresponsive => return std::future::pending().await,
            Script::Fragments(fragments) => stream::iter(fragments.clone().into_iter().map(Ok)).boxed(),
            Script::Interrupted(fragments, reason) => stream::iter(fragments.clone().into_iter().map(Ok))
                .chain(stream::once(futures_util::future::ready(Err(BackendError::Stream(
                    reason.clone(),
                )))))
                .boxed(),
            Script::Stalled(fragments) => stream::iter(fragments.clone().into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            Script::Endless => stream::repeat("Amen ".to_string()).map(Ok).boxed(),
        };

        let signal = DropSignal(self.upstream_dropped.clone());
        Ok(base
            .map(move |item| {
                signal.keep_alive();
                item
            })
            .boxed())
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, BackendError> {
        self.completions.lock().unwrap().push(messages.to_vec());
        self.completion.clone()
    }
}
