//! Runtime request/response types.

use serde::Serialize;

/// Transcription result as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
    pub probability: f32,
}

impl Transcript {
    /// Degraded result for unusable audio: empty text, zero confidence.
    pub fn empty(language: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            language: language.into(),
            probability: 0.0,
        }
    }
}

/// A complete WAV file ready to be sent as-is.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub port: u16,
    pub stt_model: String,
    pub stt_backend: String,
    pub tts_backend: String,
    pub tts_voice: String,
    pub llm_provider: String,
}
