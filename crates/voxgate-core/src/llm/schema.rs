//! Structured-output requests.

use serde_json::{Map, Value};

const JSON_MIME_TYPE: &str = "application/json";

/// What shape the provider is asked to answer in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// Any valid JSON document.
    Json,
    /// JSON conforming to a (normalized) schema.
    Schema(Value),
}

impl ResponseFormat {
    /// A non-empty schema wins; otherwise `application/json` selects JSON mode.
    pub fn resolve(mime_type: Option<&str>, schema: Option<&Value>) -> Self {
        if let Some(schema) = schema.and_then(normalize_response_schema) {
            if schema.as_object().is_some_and(|map| !map.is_empty()) {
                return ResponseFormat::Schema(schema);
            }
        }
        let mime = mime_type.map(|m| m.trim().to_ascii_lowercase());
        if mime.as_deref() == Some(JSON_MIME_TYPE) {
            ResponseFormat::Json
        } else {
            ResponseFormat::Text
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json",
            ResponseFormat::Schema(_) => "schema",
        }
    }
}

/// Rewrite vendor uppercase type tags (`OBJECT`, `STRING`, ...) into JSON
/// Schema names. Returns `None` for anything but an object.
pub fn normalize_response_schema(schema: &Value) -> Option<Value> {
    schema.as_object()?;
    Some(walk(schema))
}

fn walk(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let value = match value {
                    Value::String(tag) if key == "type" => Value::String(map_type_tag(tag)),
                    other => walk(other),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(walk).collect()),
        other => other.clone(),
    }
}

fn map_type_tag(tag: &str) -> String {
    match tag.to_ascii_uppercase().as_str() {
        "OBJECT" => "object",
        "ARRAY" => "array",
        "STRING" => "string",
        "NUMBER" => "number",
        "INTEGER" => "integer",
        "BOOLEAN" => "boolean",
        "NULL" => "null",
        _ => return tag.to_lowercase(),
    }
    .to_string()
}
