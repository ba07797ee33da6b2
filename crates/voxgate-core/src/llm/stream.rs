//! Pseudo-streaming: a completed response replayed as newline-delimited JSON.
//!
//! The provider call is not streamed. The full text is generated first and
//! then cut into fixed-size character chunks so clients written against a
//! streaming interface keep working.

use serde::Serialize;
use serde_json::Value;

use crate::llm::{ChatResponse, Usage};

pub const DEFAULT_CHUNK_CHARS: usize = 96;
pub const MIN_CHUNK_CHARS: usize = 24;
pub const MAX_CHUNK_CHARS: usize = 320;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Chunk size from a client-supplied value: a number (truncated) or a
/// numeric string. Missing, zero or unparseable values use the default; the
/// result is clamped to `[MIN_CHUNK_CHARS, MAX_CHUNK_CHARS]`.
pub fn resolve_chunk_size(raw: Option<&Value>) -> usize {
    let requested = match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let requested = match requested {
        Some(0) | None => DEFAULT_CHUNK_CHARS as i64,
        Some(n) => n,
    };
    requested.clamp(MIN_CHUNK_CHARS as i64, MAX_CHUNK_CHARS as i64) as usize
}

/// Split on character (not byte) boundaries; the last chunk may be short.
pub fn split_text(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count > 0 && count % chunk_chars == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamRecord {
    Delta { delta: String },
    Done { done: bool, usage: Usage, model: String },
}

impl StreamRecord {
    /// One NDJSON line, newline included.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}

/// Delta records for every chunk, then exactly one terminal record.
pub fn pseudo_stream(response: &ChatResponse, chunk_chars: usize) -> Vec<StreamRecord> {
    let mut records: Vec<StreamRecord> = split_text(&response.text, chunk_chars)
        .into_iter()
        .map(|chunk| StreamRecord::Delta {
            delta: chunk.to_string(),
        })
        .collect();
    records.push(StreamRecord::Done {
        done: true,
        usage: response.usage.clone(),
        model: response.model.clone(),
    });
    records
}
