//! Speech-to-text endpoint.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use voxgate_core::Transcript;

use crate::error::ApiError;
use crate::state::AppState;

/// Uploaded clip from the multipart `audio` field.
struct AudioUpload {
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Transcript>, ApiError> {
    let multipart = multipart.map_err(|_| ApiError::bad_request("No audio file provided"))?;
    let upload = read_audio_field(multipart).await?;

    let transcript = state
        .gateway
        .transcribe(&upload.bytes, upload.mime_type.as_deref())
        .await?;
    Ok(Json(transcript))
}

async fn read_audio_field(mut multipart: Multipart) -> Result<AudioUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed reading multipart field: {e}")))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            ApiError::bad_request(format!("Failed reading multipart 'audio' field: {e}"))
        })?;
        return Ok(AudioUpload {
            bytes: bytes.to_vec(),
            mime_type,
        });
    }
    Err(ApiError::bad_request("No audio file provided"))
}
