//! Content normalizer for raw generator output.
//!
//! Models sometimes answer with a structured tool invocation instead of the
//! plain text they were asked for. The tool-call shape is decoded exactly once
//! here, at the normalization boundary, into a tagged [`GeneratorReply`];
//! downstream code never re-inspects the raw JSON.

use serde_json::Value;
use std::path::Path;

/// The two tool names the generator is known to reach for.
const CSV_ANALYSIS_CALL: &str = "csv_structure_analysis";
const TD_ANALYSIS_CALL: &str = "semantic_analysis";

/// A structured function-call reply: `{"name": ..., "parameters": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub parameters: Value,
}

/// Generator output decoded once at the normalization boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorReply {
    Text(String),
    FunctionCall(FunctionCall),
}

/// Decode raw generator output. Anything that is not a JSON object carrying
/// both a `name` and a `parameters` field is plain text.
pub fn decode(raw: &str) -> GeneratorReply {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.contains("\"name\"") && trimmed.contains("\"parameters\"")
    {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
            if let (Some(Value::String(name)), Some(parameters)) =
                (obj.get("name"), obj.get("parameters"))
            {
                return GeneratorReply::FunctionCall(FunctionCall {
                    name: name.clone(),
                    parameters: parameters.clone(),
                });
            }
        }
    }
    GeneratorReply::Text(raw.to_string())
}

/// True when the text is a structured function-call reply.
pub fn is_function_call(raw: &str) -> bool {
    matches!(decode(raw), GeneratorReply::FunctionCall(_))
}

/// Recover plain textual content from raw generator output.
///
/// Idempotent: the summaries synthesized for recognized calls are themselves
/// plain text, so a second pass returns them unchanged. Fence and prefix
/// stripping for Turtle content is a separate extraction step, not done here.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match decode(raw) {
        GeneratorReply::Text(text) => text,
        GeneratorReply::FunctionCall(call) => {
            summarize_call(&call).unwrap_or_else(|| raw.to_string())
        }
    }
}

/// Plain-text summary for the two recognized call shapes; `None` for
/// anything else (the caller falls back to the raw text).
fn summarize_call(call: &FunctionCall) -> Option<String> {
    match call.name.as_str() {
        CSV_ANALYSIS_CALL => {
            let csv_file = call
                .parameters
                .get("csv_file")
                .and_then(Value::as_str)
                .unwrap_or("unknown.csv");
            Some(format!(
                "CSV file: {}\nColumns: {}",
                csv_file,
                read_headers_lossy(csv_file)
            ))
        }
        TD_ANALYSIS_CALL => Some(format!(
            "TD ID: {}\nTD Title: {}\nProperties: {}",
            param_text(&call.parameters, "td_id"),
            param_text(&call.parameters, "td_title"),
            param_text(&call.parameters, "td_properties"),
        )),
        _ => None,
    }
}

fn param_text(parameters: &Value, key: &str) -> String {
    match parameters.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Best effort only: normalization must never fail, so an unreadable file
/// degrades to a placeholder instead of an error.
fn read_headers_lossy(path: &str) -> String {
    let headers = csv::Reader::from_path(Path::new(path))
        .ok()
        .and_then(|mut r| r.headers().ok().cloned());
    match headers {
        Some(record) => record.iter().collect::<Vec<_>>().join(", "),
        None => "(unavailable)".to_string(),
    }
}
