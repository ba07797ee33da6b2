//! Error types for the gateway core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied input is unusable; no backend was invoked.
    #[error("{0}")]
    InvalidInput(String),

    /// Required configuration is missing for the selected variant.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to load {backend} backend: {reason}")]
    BackendLoadError { backend: String, reason: String },

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Audio error: {0}")]
    AudioError(String),

    /// A subprocess exited non-zero.
    #[error("{program} failed ({status}): {detail}")]
    ProcessFailed {
        program: String,
        status: String,
        detail: String,
    },

    #[error("{program} timed out after {secs}s")]
    ProcessTimeout { program: String, secs: u64 },

    /// Non-success answer from a chat-completion provider.
    #[error("{0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl Error {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Subprocess outcomes the STT path degrades into an empty transcript.
    pub fn is_process_outcome(&self) -> bool {
        matches!(
            self,
            Error::ProcessFailed { .. } | Error::ProcessTimeout { .. }
        )
    }
}
