//! Text-to-speech endpoint.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::Response,
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Returns the complete WAV file as the response body.
pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid JSON payload: {e}")))?;

    let audio = state
        .gateway
        .synthesize(req.text.as_deref().unwrap_or_default(), req.voice.as_deref())
        .await?;

    Response::builder()
        .header(header::CONTENT_TYPE, audio.content_type)
        .body(Body::from(audio.bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}
