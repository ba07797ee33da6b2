//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// API error type, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl ApiError {
    /// Chat routes answer every failure, malformed payloads included, with 500.
    pub fn chat_failure(err: voxgate_core::Error) -> Self {
        error!("Chat request failed: {}", err);
        ApiError::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<voxgate_core::Error> for ApiError {
    fn from(err: voxgate_core::Error) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            error!("Request failed: {}", err);
            ApiError::internal(err.to_string())
        }
    }
}
