//! Request handlers
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.4.0
//!
//! ## Changelog
//! - 1.1.0: Saint listing and search
//! - 1.0.0: Chat relay and suggestions endpoints

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{future, StreamExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::io;

use super::error::ApiError;
use super::AppState;
use crate::core::config::RelayFormat;
use crate::core::message::welcome_message;
use crate::core::Message;
use crate::features::personas::{Saint, DEFAULT_SAINT, STARTER_QUESTIONS};
use crate::features::relay::{RelayEvent, RelayStream};

pub const LIVENESS_MESSAGE: &str = "Saint chat relay is running";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(rename = "saintName", default)]
    pub saint_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaintQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaintSummary {
    pub name: String,
    pub years: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub image_url: Option<String>,
    pub article_url: Option<String>,
    pub welcome: String,
}

impl From<&Saint> for SaintSummary {
    fn from(saint: &Saint) -> Self {
        Self {
            name: saint.name.clone(),
            years: saint.years.clone(),
            description: saint.description.clone(),
            aliases: saint.aliases.clone(),
            image_url: saint.image_url.clone(),
            article_url: saint.article_url.clone(),
            welcome: welcome_message(&saint.name),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaintsResponse {
    pub saints: Vec<SaintSummary>,
    pub starter_questions: Vec<String>,
}

/// GET /chat
pub async fn chat_health() -> &'static str {
    LIVENESS_MESSAGE
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let saint = request.saint_name.as_deref().unwrap_or(DEFAULT_SAINT);

    let stream = state.relay.start(request.messages, saint).await?;
    info!("[{}] Streaming reply from {saint}", stream.request_id());

    Ok(match state.format {
        RelayFormat::Text => text_response(stream),
        RelayFormat::Events => event_response(stream),
    })
}

/// POST /suggestions
pub async fn suggestions(
    State(state): State<AppState>,
    payload: Result<Json<SuggestionsRequest>, JsonRejection>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let suggestions = state.suggestions.suggest(&request.content).await;
    Ok(Json(SuggestionsResponse { suggestions }))
}

/// GET /saints
pub async fn list_saints(
    State(state): State<AppState>,
    Query(query): Query<SaintQuery>,
) -> Json<SaintsResponse> {
    let saints = match query.q.as_deref() {
        Some(q) => state.catalog.search(q),
        None => state.catalog.list(),
    };

    Json(SaintsResponse {
        saints: saints.into_iter().map(SaintSummary::from).collect(),
        starter_questions: STARTER_QUESTIONS.iter().map(|s| s.to_string()).collect(),
    })
}

/// Plain text body: fragments only. A mid-stream failure errors the body so
/// the transfer is aborted instead of ending like a complete answer.
fn text_response(stream: RelayStream) -> Response {
    let request_id = stream.request_id();
    let body = stream.into_stream().filter_map(move |event| {
        future::ready(match event {
            RelayEvent::Fragment(text) => Some(Ok(text)),
            RelayEvent::Suggestions(suggestions) => {
                debug!("[{request_id}] Dropping {} suggestions from text stream", suggestions.len());
                None
            }
            RelayEvent::Failed { status, message } => {
                debug!("[{request_id}] Aborting text stream ({status}): {message}");
                Some(Err(io::Error::other(message)))
            }
        })
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Server-sent events: `token`, `suggestions` and `error`. Payloads are JSON
/// so fragments with newlines survive framing.
fn event_response(stream: RelayStream) -> Response {
    let events = stream
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse_event(event)));
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse_event(event: RelayEvent) -> Event {
    let (name, payload) = match event {
        RelayEvent::Fragment(text) => ("token", serde_json::Value::String(text)),
        RelayEvent::Suggestions(suggestions) => ("suggestions", serde_json::json!(suggestions)),
        RelayEvent::Failed { status, message } => (
            "error",
            serde_json::json!({ "status": status, "error": message }),
        ),
    };
    Event::default().event(name).data(payload.to_string())
}
