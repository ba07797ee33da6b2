//! Chat completion provider adapters.

mod ollama;
mod openai;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{ChatRequest, ChatResponse};

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Upstream error bodies are cut to this many characters.
pub(crate) const ERROR_PREVIEW_CHARS: usize = 400;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// One non-streamed completion for an already-normalized request.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

pub(crate) fn preview(body: &str) -> String {
    body.chars().take(ERROR_PREVIEW_CHARS).collect()
}
