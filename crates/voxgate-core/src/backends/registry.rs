//! Backend registry ensuring each capability is constructed once and shared.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::OnceCell;
use tracing::info;

use crate::backends::{
    KokoroWorker, PlatformSpeech, SpeechToText, SttBackendKind, Synthesizer, TtsBackendKind,
    WhisperWorker,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

pub type SttLoader =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn SpeechToText>>> + Send + Sync>;
pub type TtsLoader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<Synthesizer>>> + Send + Sync>;

/// Owns the process-lifetime STT and TTS handles.
///
/// Construction is expensive (model load), so each handle sits behind a
/// [`OnceCell`]: concurrent first callers wait on one construction instead
/// of racing their own. A failed construction leaves the cell empty and the
/// next caller tries again.
pub struct BackendRegistry {
    stt_label: String,
    tts_label: String,
    stt_loader: SttLoader,
    tts_loader: TtsLoader,
    stt: OnceCell<Arc<dyn SpeechToText>>,
    tts: OnceCell<Arc<Synthesizer>>,
}

impl BackendRegistry {
    /// Registry for the variants named in `config`. Nothing is constructed yet.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let stt_kind = config.stt.backend;
        let stt_model = config.stt.model.clone();
        let tools = config.tools.clone();
        let stt_loader: SttLoader = Box::new(move || {
            let model = stt_model.clone();
            let tools = tools.clone();
            async move {
                let worker = WhisperWorker::spawn(stt_kind, &model, &tools).await?;
                Ok::<_, Error>(Arc::new(worker) as Arc<dyn SpeechToText>)
            }
            .boxed()
        });

        let tts_kind = config.tts.backend;
        let voice = config.tts.voice.clone();
        let tools = config.tools.clone();
        let tts_loader: TtsLoader = Box::new(move || {
            let voice = voice.clone();
            let tools = tools.clone();
            async move {
                let synthesizer = match tts_kind {
                    TtsBackendKind::Kokoro => {
                        Synthesizer::Neural(Arc::new(KokoroWorker::spawn(&voice, &tools).await?))
                    }
                    TtsBackendKind::System => Synthesizer::Platform(PlatformSpeech::new(&tools)),
                };
                Ok::<_, Error>(Arc::new(synthesizer))
            }
            .boxed()
        });

        Self::with_loaders(
            stt_label(stt_kind, &config.stt.model),
            stt_loader,
            tts_kind.as_str(),
            tts_loader,
        )
    }

    /// Registry with caller-supplied constructors.
    pub fn with_loaders(
        stt_label: impl Into<String>,
        stt_loader: SttLoader,
        tts_label: impl Into<String>,
        tts_loader: TtsLoader,
    ) -> Self {
        Self {
            stt_label: stt_label.into(),
            tts_label: tts_label.into(),
            stt_loader,
            tts_loader,
            stt: OnceCell::new(),
            tts: OnceCell::new(),
        }
    }

    /// The STT handle, constructing it on first use.
    pub async fn ensure_stt(&self) -> Result<Arc<dyn SpeechToText>> {
        let backend = self
            .stt
            .get_or_try_init(|| async {
                info!("Loading STT backend {}", self.stt_label);
                let started = std::time::Instant::now();
                let backend = (self.stt_loader)().await?;
                info!(
                    "STT backend {} ready in {:.1}s",
                    self.stt_label,
                    started.elapsed().as_secs_f32()
                );
                Ok::<_, Error>(backend)
            })
            .await?;
        Ok(backend.clone())
    }

    /// The TTS handle, constructing it on first use.
    pub async fn ensure_tts(&self) -> Result<Arc<Synthesizer>> {
        let backend = self
            .tts
            .get_or_try_init(|| async {
                info!("Loading TTS backend {}", self.tts_label);
                let started = std::time::Instant::now();
                let backend = (self.tts_loader)().await?;
                info!(
                    "TTS backend {} ready in {:.1}s",
                    self.tts_label,
                    started.elapsed().as_secs_f32()
                );
                Ok::<_, Error>(backend)
            })
            .await?;
        Ok(backend.clone())
    }

    pub fn stt_loaded(&self) -> bool {
        self.stt.initialized()
    }

    pub fn tts_loaded(&self) -> bool {
        self.tts.initialized()
    }

    pub fn stt_label(&self) -> &str {
        &self.stt_label
    }

    pub fn tts_label(&self) -> &str {
        &self.tts_label
    }
}

fn stt_label(kind: SttBackendKind, model: &str) -> String {
    format!("{}:{}", kind.as_str(), model)
}
