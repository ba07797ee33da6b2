//! Whisper-family transcribers hosted in an engine worker.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::backends::worker::{WorkerProcess, WorkerSpec};
use crate::backends::{BackendTranscript, SpeechToText, SttBackendKind};
use crate::config::ToolsConfig;
use crate::error::Result;

const STT_WORKER_SCRIPT: &str = "stt_worker.py";
const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Either the batched accelerator transcriber or the int8 CPU transcriber,
/// depending on `kind`.
pub struct WhisperWorker {
    kind: SttBackendKind,
    worker: WorkerProcess,
}

#[derive(Debug, Deserialize)]
struct TranscribeReply {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    probability: Option<f32>,
}

impl WhisperWorker {
    pub async fn spawn(kind: SttBackendKind, model: &str, tools: &ToolsConfig) -> Result<Self> {
        let spec = WorkerSpec {
            program: tools.python.clone(),
            script: tools.scripts_dir.join(STT_WORKER_SCRIPT),
            args: vec![
                "--engine".to_string(),
                kind.as_str().to_string(),
                "--model".to_string(),
                model.to_string(),
            ],
            load_timeout: MODEL_LOAD_TIMEOUT,
        };
        let worker = WorkerProcess::spawn(kind.as_str(), &spec).await?;
        Ok(Self {
            kind,
            worker,
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperWorker {
    fn name(&self) -> &str {
        self.worker.name()
    }

    fn requires_normalized_input(&self) -> bool {
        matches!(self.kind, SttBackendKind::BatchedWhisper)
    }

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<BackendTranscript> {
        let reply = self
            .worker
            .request(json!({
                "op": "transcribe",
                "path": audio_path.to_string_lossy(),
                "language": language,
            }))
            .await?;
        let reply: TranscribeReply = serde_json::from_value(reply)?;

        Ok(BackendTranscript {
            text: reply.text,
            language: reply.language.filter(|l| !l.trim().is_empty()),
            probability: reply.probability,
        })
    }
}
