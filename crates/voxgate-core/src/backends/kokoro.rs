//! Neural multi-voice synthesizer hosted in an engine worker.

use std::time::Duration;

use base64::Engine;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::audio::NEURAL_TTS_SAMPLE_RATE;
use crate::backends::worker::{WorkerProcess, WorkerSpec};
use crate::backends::{NeuralSynthesizer, SegmentStream};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};

const TTS_WORKER_SCRIPT: &str = "tts_worker.py";
const TTS_MODEL_REPO: &str = "mlx-community/Kokoro-82M-bf16";
const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub struct KokoroWorker {
    worker: WorkerProcess,
}

impl KokoroWorker {
    pub async fn spawn(default_voice: &str, tools: &ToolsConfig) -> Result<Self> {
        let spec = WorkerSpec {
            program: tools.python.clone(),
            script: tools.scripts_dir.join(TTS_WORKER_SCRIPT),
            args: vec![
                "--model".to_string(),
                TTS_MODEL_REPO.to_string(),
                "--voice".to_string(),
                default_voice.to_string(),
            ],
            load_timeout: MODEL_LOAD_TIMEOUT,
        };
        let worker = WorkerProcess::spawn("kokoro", &spec).await?;
        Ok(Self { worker })
    }
}

impl NeuralSynthesizer for KokoroWorker {
    fn name(&self) -> &str {
        self.worker.name()
    }

    fn sample_rate(&self) -> u32 {
        NEURAL_TTS_SAMPLE_RATE
    }

    fn generate<'a>(&'a self, text: &'a str, voice: &'a str, speed: f32) -> SegmentStream<'a> {
        let request = json!({
            "op": "generate",
            "text": text,
            "voice": voice,
            "speed": speed,
            "lang_code": lang_code(voice),
        });
        self.worker
            .request_stream(request)
            .map(|reply| reply.and_then(decode_segment))
            .boxed()
    }
}

/// Kokoro voice ids lead with their language letter (`a` American English,
/// `b` British English, ...).
fn lang_code(voice: &str) -> String {
    voice
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| "a".to_string())
}

/// One reply line carries base64 of little-endian f32 samples.
fn decode_segment(reply: Value) -> Result<Vec<f32>> {
    let encoded = reply
        .get("audio")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InferenceError("kokoro: segment without audio".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::InferenceError(format!("kokoro: bad segment encoding: {e}")))?;
    if bytes.len() % 4 != 0 {
        return Err(Error::InferenceError(format!(
            "kokoro: segment length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_code_follows_voice_prefix() {
        assert_eq!(lang_code("am_puck"), "a");
        assert_eq!(lang_code("bf_emma"), "b");
        assert_eq!(lang_code(""), "a");
    }

    #[test]
    fn segment_decodes_little_endian_floats() {
        let mut raw = Vec::new();
        for s in [0.5f32, -1.0] {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&raw);
        let samples = decode_segment(json!({ "audio": encoded })).unwrap();
        assert_eq!(samples, vec![0.5, -1.0]);
    }

    #[test]
    fn segment_without_audio_is_rejected() {
        assert!(decode_segment(json!({ "seq": 0 })).is_err());
    }
}
