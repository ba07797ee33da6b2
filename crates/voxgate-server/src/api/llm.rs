//! Chat completion endpoints.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::Response,
    Json,
};
use voxgate_core::llm::stream::NDJSON_CONTENT_TYPE;
use voxgate_core::{ChatPayload, ChatResponse};

use crate::error::ApiError;
use crate::state::AppState;

fn parse_payload(payload: Result<Json<ChatPayload>, JsonRejection>) -> Result<ChatPayload, ApiError> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|e| ApiError::internal(format!("Invalid JSON payload: {e}")))
}

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let payload = parse_payload(payload)?;
    let response = state
        .gateway
        .chat()
        .generate(payload)
        .await
        .map_err(ApiError::chat_failure)?;
    Ok(Json(response))
}

/// Newline-delimited JSON replay of a completed answer.
pub async fn generate_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_payload(payload)?;
    let records = state
        .gateway
        .chat()
        .generate_stream(payload)
        .await
        .map_err(ApiError::chat_failure)?;

    let stream = futures::stream::iter(
        records
            .into_iter()
            .map(|record| Ok::<_, Infallible>(record.to_line())),
    );

    Response::builder()
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}
