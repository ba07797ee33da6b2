//! Backend capability interfaces and their concrete variants.
//!
//! Each capability has a closed set of variants picked once from
//! configuration. Request handlers only see the capability traits; the
//! [`BackendRegistry`] owns the single instance of each.

mod kokoro;
mod registry;
mod system_speech;
mod whisper;
pub mod worker;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use kokoro::KokoroWorker;
pub use registry::{BackendRegistry, SttLoader, TtsLoader};
pub use system_speech::PlatformSpeech;
pub use whisper::WhisperWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SttBackendKind {
    /// Batched accelerator transcriber; wants 16 kHz mono WAV input.
    #[serde(rename = "mlx")]
    BatchedWhisper,
    /// Generic int8 CPU transcriber; decodes containers itself.
    #[serde(rename = "cpu")]
    CpuWhisper,
}

impl SttBackendKind {
    /// `mlx` selects the batched transcriber; any other value the CPU one.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mlx" => SttBackendKind::BatchedWhisper,
            _ => SttBackendKind::CpuWhisper,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SttBackendKind::BatchedWhisper => "mlx",
            SttBackendKind::CpuWhisper => "cpu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtsBackendKind {
    #[serde(rename = "kokoro")]
    Kokoro,
    #[serde(rename = "system")]
    System,
}

impl TtsBackendKind {
    /// `kokoro` selects the neural synthesizer; any other value the platform utility.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kokoro" => TtsBackendKind::Kokoro,
            _ => TtsBackendKind::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TtsBackendKind::Kokoro => "kokoro",
            TtsBackendKind::System => "system",
        }
    }
}

/// What a transcriber reports; missing fields are filled in by the gateway.
#[derive(Debug, Clone, Default)]
pub struct BackendTranscript {
    pub text: String,
    pub language: Option<String>,
    pub probability: Option<f32>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    /// Whether non-WAV uploads must be decoded to 16 kHz mono PCM first.
    fn requires_normalized_input(&self) -> bool;

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<BackendTranscript>;
}

/// Lazy, finite, single-pass sequence of raw float PCM segments.
pub type SegmentStream<'a> = BoxStream<'a, Result<Vec<f32>>>;

pub trait NeuralSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn generate<'a>(&'a self, text: &'a str, voice: &'a str, speed: f32) -> SegmentStream<'a>;
}

/// The TTS capability: accelerator-bound neural synthesis or the platform utility.
pub enum Synthesizer {
    Neural(Arc<dyn NeuralSynthesizer>),
    Platform(PlatformSpeech),
}

impl Synthesizer {
    pub fn name(&self) -> &str {
        match self {
            Synthesizer::Neural(neural) => neural.name(),
            Synthesizer::Platform(_) => TtsBackendKind::System.as_str(),
        }
    }
}
