//! LLM chat gateway.
//!
//! Requests arrive in a vendor-style shape (`systemInstruction`, `contents`
//! with `parts`) and are normalized into a canonical message list before
//! being dispatched to the selected provider adapter.

mod messages;
pub mod providers;
mod schema;
pub mod stream;

use std::sync::Arc;

use reqwest::Client;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::LlmConfig;
use crate::error::Result;

pub use messages::{build_messages, parts_to_text, ChatMessage, ChatRole, FALLBACK_USER_MESSAGE};
pub use providers::{ChatProvider, OllamaProvider, OpenAiProvider};
pub use schema::{normalize_response_schema, ResponseFormat};
pub use stream::{pseudo_stream, resolve_chunk_size, StreamRecord};

pub const DEFAULT_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl ProviderKind {
    /// `openai` selects the remote adapter; anything else the local one.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => ProviderKind::OpenAi,
            _ => ProviderKind::Ollama,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
        }
    }
}

/// Chat request body as clients send it.
///
/// Scalar fields are coerced: numbers are accepted where text is expected and
/// numeric strings where numbers are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default)]
    pub system_instruction: Option<Value>,
    #[serde(default)]
    pub contents: Option<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_output_tokens: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub response_mime_type: Option<String>,
    #[serde(default)]
    pub response_schema: Option<Value>,
    #[serde(default)]
    pub stream_chunk_size: Option<Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!("expected a string, got {other}"))),
    }
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got \"{s}\""))),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// A validated request ready for a provider adapter.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub response_format: ResponseFormat,
}

impl ChatPayload {
    /// Normalize and validate. Fails with invalid input when the persona
    /// prompt is missing; no provider is contacted in that case.
    pub fn into_request(self, default_provider: ProviderKind) -> Result<ChatRequest> {
        let contents = match &self.contents {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        let messages = build_messages(self.system_instruction.as_ref(), contents)?;

        let provider = self
            .provider
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(ProviderKind::parse)
            .unwrap_or(default_provider);
        let model = self
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let max_output_tokens = self
            .max_output_tokens
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n.trunc().min(u32::MAX as f64) as u32)
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
        let response_format = ResponseFormat::resolve(
            self.response_mime_type.as_deref(),
            self.response_schema.as_ref(),
        );

        Ok(ChatRequest {
            provider,
            model,
            messages,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens,
            response_format,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Usage,
    pub model: String,
    pub provider: String,
}

/// Dispatches normalized chat requests to the provider adapters.
pub struct ChatGateway {
    default_provider: ProviderKind,
    ollama: Arc<dyn ChatProvider>,
    openai: Arc<dyn ChatProvider>,
}

impl ChatGateway {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_providers(
            config.provider,
            Arc::new(OllamaProvider::new(client.clone(), config.ollama_base_url.clone())),
            Arc::new(OpenAiProvider::new(
                client,
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
            )),
        ))
    }

    pub fn with_providers(
        default_provider: ProviderKind,
        ollama: Arc<dyn ChatProvider>,
        openai: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            default_provider,
            ollama,
            openai,
        }
    }

    /// One complete, non-streamed answer.
    pub async fn generate(&self, payload: ChatPayload) -> Result<ChatResponse> {
        let persona_chars = payload
            .system_instruction
            .as_ref()
            .and_then(Value::as_str)
            .map(|s| s.trim().chars().count())
            .unwrap_or(0);
        let request = payload.into_request(self.default_provider)?;

        info!(
            "LLM request provider={} model={} messages={} systemChars={} format={}",
            request.provider.as_str(),
            request.model,
            request.messages.len(),
            persona_chars,
            request.response_format.label()
        );

        let provider = match request.provider {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Ollama => &self.ollama,
        };
        provider.complete(&request).await
    }

    /// The complete answer replayed as delta records plus one terminal record.
    pub async fn generate_stream(&self, payload: ChatPayload) -> Result<Vec<StreamRecord>> {
        let chunk_chars = resolve_chunk_size(payload.stream_chunk_size.as_ref());
        let response = self.generate(payload).await?;
        Ok(pseudo_stream(&response, chunk_chars))
    }
}
