//! HTTP error mapping
//!
//! Every error leaving the service is a status code plus `{"error": "..."}`.
//! Upstream details are logged by the relay and never echoed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::features::relay::RelayError;

pub const GENERATION_FAILED: &str = "Failed to generate response";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnknownSaint(String),
    Upstream,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::UnknownSaint(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(reason) => format!("Invalid request: {reason}"),
            ApiError::UnknownSaint(name) => format!("Unknown saint: {name}"),
            ApiError::Upstream => GENERATION_FAILED.to_string(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UnknownSaint(name) => ApiError::UnknownSaint(name),
            RelayError::UpstreamRequest(_) => ApiError::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}
