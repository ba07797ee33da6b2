//! Canonical, provider-agnostic message list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Stand-in for inline media parts, which providers here cannot receive.
pub const IMAGE_PLACEHOLDER: &str = "[image omitted]";

/// Sent when no conversation turn carries any text.
pub const FALLBACK_USER_MESSAGE: &str = "Say hello in one short sentence.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Map a vendor role string onto the canonical set.
    ///
    /// `model` is the vendor alias for `assistant`; anything unrecognized is
    /// treated as `user`.
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "system" => ChatRole::System,
            "assistant" | "model" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Build the canonical list from a persona prompt and vendor-shaped turns.
///
/// The system message always comes first and is the only one: later turns
/// tagged `system` are folded into it. If no turn survives, a single default
/// user message is appended so providers never see an empty conversation.
pub fn build_messages(system_instruction: Option<&Value>, contents: &[Value]) -> Result<Vec<ChatMessage>> {
    let persona = system_instruction
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidInput(
                "systemInstruction is required for realtime LLM requests (persona prompt missing)."
                    .to_string(),
            )
        })?;

    let mut system = persona.to_string();
    let mut turns = Vec::new();

    for item in contents {
        let Some(turn) = item.as_object() else {
            continue;
        };
        let role = match turn.get("role") {
            Some(Value::String(role)) => ChatRole::from_vendor(role),
            Some(Value::Null) | None => ChatRole::User,
            Some(other) => ChatRole::from_vendor(&other.to_string()),
        };
        let parts = turn
            .get("parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let text = parts_to_text(parts);
        if text.is_empty() {
            continue;
        }

        if role == ChatRole::System {
            system.push_str("\n\n");
            system.push_str(&text);
        } else {
            turns.push(ChatMessage::new(role, text));
        }
    }

    if turns.is_empty() {
        turns.push(ChatMessage::new(ChatRole::User, FALLBACK_USER_MESSAGE));
    }

    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(ChatMessage::new(ChatRole::System, system));
    messages.extend(turns);
    Ok(messages)
}

/// Flatten a turn's parts into newline-joined text.
pub fn parts_to_text(parts: &[Value]) -> String {
    let mut chunks = Vec::new();
    for part in parts {
        let Some(part) = part.as_object() else {
            continue;
        };
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                chunks.push(text.to_string());
                continue;
            }
        }
        let inline = part.get("inline_data").or_else(|| part.get("inlineData"));
        if inline.is_some_and(is_truthy) {
            chunks.push(IMAGE_PLACEHOLDER.to_string());
        }
    }
    chunks.join("\n").trim().to_string()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
