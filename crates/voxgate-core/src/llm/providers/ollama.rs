use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{preview, ChatProvider};
use crate::error::{Error, Result};
use crate::llm::{ChatRequest, ChatResponse, ProviderKind, ResponseFormat, Usage};

const CHAT_TIMEOUT: Duration = Duration::from_secs(90);
const TAGS_TIMEOUT: Duration = Duration::from_secs(15);
const LISTED_MODELS: usize = 8;

/// Local model server speaking the Ollama chat API.
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<Value>,
}

impl OllamaProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Installed model names, or empty if the listing cannot be fetched.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(models) => models,
            Err(e) => {
                debug!("Ollama model listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_tags(&self) -> Result<Vec<String>> {
        let tags: TagsReply = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(TAGS_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(tags
            .models
            .iter()
            .filter_map(|item| {
                let item = item.as_object()?;
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .or_else(|| item.get("model").and_then(Value::as_str))?
                    .trim();
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect())
    }

    fn request_body(request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_output_tokens,
            },
        });
        match &request.response_format {
            ResponseFormat::Schema(schema) => body["format"] = schema.clone(),
            ResponseFormat::Json => body["format"] = json!("json"),
            ResponseFormat::Text => {}
        }
        body
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(CHAT_TIMEOUT)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let mut detail = preview(&raw);
            if status == StatusCode::NOT_FOUND && raw.to_lowercase().contains("not found") {
                let available = self.list_models().await;
                if available.is_empty() {
                    detail.push_str(" | no local models found from /api/tags");
                } else {
                    let listed: Vec<&str> =
                        available.iter().take(LISTED_MODELS).map(String::as_str).collect();
                    detail.push_str(&format!(" | available models: {}", listed.join(", ")));
                }
            }
            warn!("Ollama returned {} for model {}", status.as_u16(), request.model);
            return Err(Error::Upstream(format!(
                "Ollama error ({}): {}",
                status.as_u16(),
                detail
            )));
        }

        let reply: ChatReply = serde_json::from_str(&raw)?;
        let text = reply
            .message
            .and_then(|m| m.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(ChatResponse {
            text,
            usage: Usage {
                prompt_token_count: reply.prompt_eval_count.unwrap_or(0),
                candidates_token_count: reply.eval_count.unwrap_or(0),
            },
            model: reply
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| request.model.clone()),
            provider: ProviderKind::Ollama.as_str().to_string(),
        })
    }
}
