use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{preview, ChatProvider};
use crate::error::{Error, Result};
use crate::llm::{ChatRequest, ChatResponse, ProviderKind, ResponseFormat, Usage};

const CHAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Remote OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

impl OpenAiProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body(request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
        });
        match &request.response_format {
            ResponseFormat::Schema(schema) => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": { "name": "response", "schema": schema },
                });
            }
            ResponseFormat::Json => body["response_format"] = json!({ "type": "json_object" }),
            ResponseFormat::Text => {}
        }
        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(Error::ConfigError(
                "OPENAI_API_KEY is required when REALTIME_LLM_PROVIDER=openai".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(CHAT_TIMEOUT)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            warn!("OpenAI returned {} for model {}", status.as_u16(), request.model);
            return Err(Error::Upstream(format!(
                "OpenAI error ({}): {}",
                status.as_u16(),
                preview(&raw)
            )));
        }

        let reply: CompletionReply = serde_json::from_str(&raw)?;
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default()
            .trim()
            .to_string();
        let usage = reply.usage.unwrap_or_default();

        Ok(ChatResponse {
            text,
            usage: Usage {
                prompt_token_count: usage.prompt_tokens.unwrap_or(0),
                candidates_token_count: usage.completion_tokens.unwrap_or(0),
            },
            model: reply
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| request.model.clone()),
            provider: ProviderKind::OpenAi.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ChatRole};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request(format: ResponseFormat) -> ChatRequest {
        ChatRequest {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage::new(ChatRole::System, "persona"),
                ChatMessage::new(ChatRole::User, "hi"),
            ],
            temperature: 0.2,
            max_output_tokens: 64,
            response_format: format,
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        // Nothing listens on the discard port; a network attempt would surface as an HTTP error.
        let provider = OpenAiProvider::new(Client::new(), "http://127.0.0.1:9", "");
        let err = provider
            .complete(&request(ResponseFormat::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn completion_is_parsed_with_bearer_auth() {
        let captured: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *sink.lock().unwrap() = Some((auth, body));
                    Json(json!({
                        "model": "gpt-4o-mini-2024",
                        "choices": [{ "message": { "role": "assistant", "content": " {\"ok\":true} " } }],
                        "usage": { "prompt_tokens": 30, "completion_tokens": 6 }
                    }))
                }
            }),
        );
        let base = serve(router).await;

        let provider = OpenAiProvider::new(Client::new(), base, "sk-test");
        let response = provider
            .complete(&request(ResponseFormat::Schema(json!({ "type": "object" }))))
            .await
            .unwrap();

        assert_eq!(response.text, "{\"ok\":true}");
        assert_eq!(response.usage.prompt_token_count, 30);
        assert_eq!(response.usage.candidates_token_count, 6);
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.provider, "openai");

        let (auth, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(auth, "Bearer sk-test");
        assert_eq!(body["max_tokens"], json!(64));
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"],
            json!({ "type": "object" })
        );
    }

    #[tokio::test]
    async fn empty_choices_yield_empty_text() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = serve(router).await;

        let provider = OpenAiProvider::new(Client::new(), base, "sk-test");
        let response = provider.complete(&request(ResponseFormat::Json)).await.unwrap();
        assert_eq!(response.text, "");
        assert_eq!(response.usage, Usage::default());
        assert_eq!(response.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base = serve(router).await;

        let provider = OpenAiProvider::new(Client::new(), base, "sk-bad");
        let err = provider
            .complete(&request(ResponseFormat::Text))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenAI error (401): invalid api key");
    }
}
