use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::generator::DecodeMode;

/// Decoded generator output: always a JSON object.
pub type RawObject = Map<String, Value>;

fn strict(text: &str) -> std::result::Result<RawObject, String> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

/// Recovery path for chatty replies: parse the slice between the first `{` and the last `}`.
fn outermost_braces(text: &str) -> std::result::Result<RawObject, String> {
    let start = text.find('{').ok_or("no '{' in response")?;
    let end = text.rfind('}').ok_or("no '}' in response")?;
    if end < start {
        return Err("no brace-delimited object in response".to_string());
    }
    strict(&text[start..=end])
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode a generator reply according to the mode it was requested in.
///
/// Structured replies must be exactly one object. Freeform replies are tried strictly first,
/// then through the outermost-brace slice.
pub fn decode(backend: &str, mode: DecodeMode, text: &str) -> Result<RawObject> {
    let decoded = match mode {
        DecodeMode::Structured => strict(text),
        DecodeMode::Freeform => strict(text).or_else(|first| {
            outermost_braces(text).map_err(|second| format!("{first}; fallback: {second}"))
        }),
    };
    decoded.map_err(|message| Error::DecodeFailed {
        backend: backend.to_string(),
        mode,
        message,
    })
}
