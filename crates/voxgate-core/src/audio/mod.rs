//! Audio container helpers.

pub mod wav;

pub use wav::{encode_f32, encode_pcm16, read_wav_spec, WavInfo, WAV_HEADER_LEN};

/// Sample rate the batched transcriber expects after normalization.
pub const STT_SAMPLE_RATE: u32 = 16_000;

/// Output rate of the neural synthesizer.
pub const NEURAL_TTS_SAMPLE_RATE: u32 = 24_000;

/// Output rate of the platform speech fallback.
pub const PLATFORM_TTS_SAMPLE_RATE: u32 = 22_050;

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Container kind of an uploaded clip, derived from its declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Wav,
    /// Browser capture formats (webm/ogg/mp4); needs decoding before PCM models.
    Encoded,
}

impl AudioKind {
    pub fn from_mime(mime: Option<&str>) -> Self {
        let normalized = mime.unwrap_or_default().to_ascii_lowercase();
        if ["audio/wav", "audio/x-wav", "audio/wave"]
            .iter()
            .any(|wav| normalized.contains(wav))
        {
            AudioKind::Wav
        } else {
            AudioKind::Encoded
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            AudioKind::Wav => ".wav",
            AudioKind::Encoded => ".webm",
        }
    }
}
