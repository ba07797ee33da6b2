//! Gateway context shared by every request.

use tracing::info;

use crate::backends::BackendRegistry;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::llm::ChatGateway;
use crate::runtime::gpu::GpuLock;
use crate::runtime::types::HealthReport;

pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) registry: BackendRegistry,
    pub(crate) gpu: GpuLock,
    pub(crate) chat: ChatGateway,
}

impl Gateway {
    /// Build the gateway for `config`. Backends are not constructed until
    /// their first request.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let registry = BackendRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Gateway over a caller-built registry.
    pub fn with_registry(config: GatewayConfig, registry: BackendRegistry) -> Result<Self> {
        let chat = ChatGateway::new(&config.llm)?;
        Self::with_parts(config, registry, chat)
    }

    pub fn with_parts(
        config: GatewayConfig,
        registry: BackendRegistry,
        chat: ChatGateway,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.scratch_dir)?;
        info!(
            "Gateway ready: stt={} tts={} llm={} scratch={}",
            registry.stt_label(),
            registry.tts_label(),
            config.llm.provider.as_str(),
            config.scratch_dir.display()
        );
        Ok(Self {
            config,
            registry,
            gpu: GpuLock::new(),
            chat,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn gpu(&self) -> &GpuLock {
        &self.gpu
    }

    pub fn chat(&self) -> &ChatGateway {
        &self.chat
    }

    /// Static liveness report; constructs no backend.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            port: self.config.port,
            stt_model: self.config.stt.model.clone(),
            stt_backend: self.config.stt.backend.as_str().to_string(),
            tts_backend: self.config.tts.backend.as_str().to_string(),
            tts_voice: self.config.tts.voice.clone(),
            llm_provider: self.config.llm.provider.as_str().to_string(),
        }
    }
}
