//! Function-call normalization across providers.
//!
//! Providers with native function calling hand back a structured call that is
//! passed through unchanged. Providers without it return free text that may
//! embed a JSON function call among prose; [`normalize_text`] recovers the
//! first valid call, or classifies the whole output as a text response.
//!
//! Normalization is total: unparsable input degrades to
//! [`FunctionCallResponse::Text`] with the original text verbatim.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::types::{FunctionCall, FunctionCallResponse};

/// Raw output of an LLM call before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawLlmOutput {
    /// Already structured by a provider with native function calling.
    Native(FunctionCallResponse),
    /// Free text from a provider without native function calling.
    Text(String),
}

/// Turn raw LLM output into a single discriminated response.
pub fn normalize(raw: RawLlmOutput) -> FunctionCallResponse {
    match raw {
        RawLlmOutput::Native(response) => response,
        RawLlmOutput::Text(text) => normalize_text(&text),
    }
}

/// Recover an embedded function call from free text.
///
/// Candidates are balanced-brace substrings in order of appearance. Each is
/// tried as a bare `{name, arguments, id}` object, then wrapped in
/// `{"function_call": {...}}` or `{"tool_call": {...}}`. The first candidate
/// with a non-empty name and object-shaped arguments wins.
pub fn normalize_text(text: &str) -> FunctionCallResponse {
    for candidate in json_object_candidates(text) {
        if let Some(call) = parse_candidate(candidate) {
            return FunctionCallResponse::FunctionCall(call);
        }
    }
    FunctionCallResponse::Text(text.to_string())
}

#[derive(Debug, Deserialize)]
struct RawCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    id: Option<String>,
}

fn parse_candidate(candidate: &str) -> Option<FunctionCall> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    if let Some(call) = call_from_object(object) {
        return Some(call);
    }
    ["function_call", "tool_call"]
        .iter()
        .filter_map(|key| object.get(*key)?.as_object())
        .find_map(call_from_object)
}

fn call_from_object(object: &Map<String, Value>) -> Option<FunctionCall> {
    let raw: RawCall = serde_json::from_value(Value::Object(object.clone())).ok()?;
    let name = raw.name?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let arguments = structured_arguments(raw.arguments)?;
    Some(FunctionCall {
        name,
        arguments,
        id: raw.id.filter(|id| !id.is_empty()),
    })
}

/// Arguments must be an object. Providers that encode them as a JSON string
/// are decoded; absent arguments become `{}`.
fn structured_arguments(arguments: Option<Value>) -> Option<Value> {
    match arguments {
        None | Some(Value::Null) => Some(Value::Object(Map::new())),
        Some(Value::Object(map)) => Some(Value::Object(map)),
        Some(Value::String(encoded)) => {
            let trimmed = encoded.trim();
            if trimmed.is_empty() {
                return Some(Value::Object(Map::new()));
            }
            match serde_json::from_str::<Value>(trimmed).ok()? {
                Value::Object(map) => Some(Value::Object(map)),
                _ => None,
            }
        }
        Some(_) => None,
    }
}

/// Balanced `{...}` substrings, ordered by start offset.
///
/// One pass over the text with a stack of open braces, so unmatched braces
/// cost nothing extra. Quotes only count once a brace is open, and braces
/// inside JSON string literals are ignored. Nested objects follow their
/// enclosing candidate so a valid inner call is still found when the outer
/// object is not a call.
fn json_object_candidates(text: &str) -> Vec<&str> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(idx),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, idx));
                }
            }
            _ => {}
        }
    }
    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
        .into_iter()
        .map(|(start, end)| &text[start..=end])
        .collect()
}
