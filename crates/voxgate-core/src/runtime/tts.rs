//! TTS runtime methods.

use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use tracing::info;

use crate::audio::{encode_f32, WAV_CONTENT_TYPE};
use crate::backends::{NeuralSynthesizer, Synthesizer};
use crate::error::{Error, Result};
use crate::runtime::service::Gateway;
use crate::runtime::types::SpeechAudio;

const SPEECH_SPEED: f32 = 1.0;

impl Gateway {
    /// Render `text` as a complete WAV file.
    ///
    /// `voice` falls back to the configured default when absent or blank.
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<SpeechAudio> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("No text provided".to_string()));
        }
        let voice = voice
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.config.tts.voice)
            .trim()
            .to_lowercase();

        let started = Instant::now();
        let synthesizer = self.registry.ensure_tts().await?;
        let audio = match synthesizer.as_ref() {
            Synthesizer::Neural(neural) => {
                self.synthesize_neural(neural.clone(), text, &voice)
                    .await?
            }
            Synthesizer::Platform(platform) => SpeechAudio {
                bytes: platform.synthesize(text, &self.config.scratch_dir).await?,
                sample_rate: platform.sample_rate(),
                content_type: WAV_CONTENT_TYPE,
            },
        };

        info!(
            "TTS {} generated {} bytes in {}ms",
            synthesizer.name(),
            audio.bytes.len(),
            started.elapsed().as_millis()
        );
        Ok(audio)
    }

    /// The accelerator lock is held until the last segment has been drained.
    async fn synthesize_neural(
        &self,
        synth: Arc<dyn NeuralSynthesizer>,
        text: &str,
        voice: &str,
    ) -> Result<SpeechAudio> {
        let drain = {
            let synth = synth.clone();
            let text = text.to_string();
            let voice = voice.to_string();
            async move {
                synth
                    .generate(&text, &voice, SPEECH_SPEED)
                    .try_collect::<Vec<Vec<f32>>>()
                    .await
            }
        };
        let segments = self.gpu.run_exclusive("tts", drain).await?;
        if segments.is_empty() {
            return Err(Error::InferenceError(format!(
                "{}: no audio produced",
                synth.name()
            )));
        }

        let samples = segments.concat();
        let sample_rate = synth.sample_rate();
        Ok(SpeechAudio {
            bytes: encode_f32(&samples, sample_rate)?,
            sample_rate,
            content_type: WAV_CONTENT_TYPE,
        })
    }
}
