//! Configuration types for the voxgate gateway

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backends::{SttBackendKind, TtsBackendKind};
use crate::llm::ProviderKind;

/// Main gateway configuration, resolved once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port reported by `/health` and used by the server when no CLI override is given
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub stt: SttConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Directory for request-scoped scratch files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_backend")]
    pub backend: SttBackendKind,

    /// Model size passed to the transcriber (tiny, base, small, ...)
    #[serde(default = "default_stt_model")]
    pub model: String,

    /// Uploads strictly smaller than this are answered with an empty transcript
    #[serde(default = "default_min_audio_bytes")]
    pub min_audio_bytes: usize,

    /// Language hint handed to the transcriber
    #[serde(default = "default_stt_language")]
    pub language: String,

    /// Wall-clock limit for decoding an upload to 16 kHz mono WAV
    #[serde(default = "default_decode_timeout_secs")]
    pub decode_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_backend")]
    pub backend: TtsBackendKind,

    #[serde(default = "default_voice")]
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider used when a request does not name one
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Only required when the remote provider is selected
    #[serde(default, skip_serializing)]
    pub openai_api_key: String,
}

/// External executables the gateway shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_say")]
    pub say: String,

    #[serde(default = "default_afconvert")]
    pub afconvert: String,

    /// Directory holding the worker scripts
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: default_stt_backend(),
            model: default_stt_model(),
            min_audio_bytes: default_min_audio_bytes(),
            language: default_stt_language(),
            decode_timeout_secs: default_decode_timeout_secs(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: default_tts_backend(),
            voice: default_voice(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama_base_url: default_ollama_base_url(),
            openai_base_url: default_openai_base_url(),
            openai_api_key: String::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            ffmpeg: default_ffmpeg(),
            say: default_say(),
            afconvert: default_afconvert(),
            scripts_dir: default_scripts_dir(),
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from the process environment.
    ///
    /// Each option reads a list of variable names; the first one that is set
    /// and non-empty wins, otherwise the default applies.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|raw| raw.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let defaults = Self::default();

        let port = match first(&["REALTIME_PROCESSING_PORT"]) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "Invalid REALTIME_PROCESSING_PORT='{}', falling back to {}",
                        raw,
                        defaults.port
                    );
                    defaults.port
                }
            },
            None => defaults.port,
        };

        let min_audio_bytes = first(&["REALTIME_MIN_STT_AUDIO_BYTES"])
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.stt.min_audio_bytes);

        Self {
            port,
            stt: SttConfig {
                backend: first(&["REALTIME_STT_BACKEND", "STT_BACKEND"])
                    .map(|raw| SttBackendKind::parse(&raw))
                    .unwrap_or(defaults.stt.backend),
                model: first(&["REALTIME_STT_MODEL", "WHISPER_MODEL"])
                    .unwrap_or(defaults.stt.model),
                min_audio_bytes,
                language: first(&["REALTIME_STT_LANGUAGE"]).unwrap_or(defaults.stt.language),
                decode_timeout_secs: defaults.stt.decode_timeout_secs,
            },
            tts: TtsConfig {
                backend: first(&["REALTIME_TTS_BACKEND", "TTS_BACKEND"])
                    .map(|raw| TtsBackendKind::parse(&raw))
                    .unwrap_or(defaults.tts.backend),
                voice: first(&["REALTIME_KOKORO_VOICE", "KOKORO_VOICE"])
                    .unwrap_or(defaults.tts.voice),
            },
            llm: LlmConfig {
                provider: first(&["REALTIME_LLM_PROVIDER"])
                    .map(|raw| ProviderKind::parse(&raw))
                    .unwrap_or(defaults.llm.provider),
                ollama_base_url: first(&["REALTIME_LLM_BASE_URL"])
                    .map(|url| trim_base_url(&url))
                    .unwrap_or(defaults.llm.ollama_base_url),
                openai_base_url: first(&["REALTIME_OPENAI_BASE_URL"])
                    .map(|url| trim_base_url(&url))
                    .unwrap_or(defaults.llm.openai_base_url),
                openai_api_key: first(&["OPENAI_API_KEY"]).unwrap_or_default(),
            },
            tools: ToolsConfig {
                python: first(&["VOXGATE_PYTHON"]).unwrap_or(defaults.tools.python),
                ffmpeg: first(&["VOXGATE_FFMPEG"]).unwrap_or(defaults.tools.ffmpeg),
                say: first(&["VOXGATE_SAY"]).unwrap_or(defaults.tools.say),
                afconvert: first(&["VOXGATE_AFCONVERT"]).unwrap_or(defaults.tools.afconvert),
                scripts_dir: first(&["VOXGATE_SCRIPTS_DIR"])
                    .map(PathBuf::from)
                    .unwrap_or(defaults.tools.scripts_dir),
            },
            scratch_dir: first(&["VOXGATE_SCRATCH_DIR"])
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
        }
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn default_port() -> u16 {
    3002
}

fn default_stt_backend() -> SttBackendKind {
    SttBackendKind::BatchedWhisper
}

fn default_stt_model() -> String {
    "small".to_string()
}

fn default_min_audio_bytes() -> usize {
    2048
}

fn default_stt_language() -> String {
    "en".to_string()
}

fn default_decode_timeout_secs() -> u64 {
    12
}

fn default_tts_backend() -> TtsBackendKind {
    TtsBackendKind::Kokoro
}

fn default_voice() -> String {
    "am_puck".to_string()
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_ollama_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_say() -> String {
    "say".to_string()
}

fn default_afconvert() -> String {
    "afconvert".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}
