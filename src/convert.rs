//! Argument extraction helpers for tool calls.
//!
//! MCP clients send numbers as JSON numbers of either flavour, so integer
//! arguments accept integral floats too.

use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    match args.get(name) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(JsonValue::Null) | None => Err(McpError::MissingArg(name.to_string())),
        Some(_) => Err(McpError::invalid_arg(name, "expected a string")),
    }
}

/// Helper to get an optional string argument from JSON arguments.
pub fn get_optional_string(args: &Map<String, JsonValue>, name: &str) -> Result<Option<String>> {
    match args.get(name) {
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(JsonValue::Null) | None => Ok(None),
        Some(_) => Err(McpError::invalid_arg(name, "expected a string")),
    }
}

/// Helper to get an optional non-negative integer argument.
pub fn get_optional_u64(args: &Map<String, JsonValue>, name: &str) -> Result<Option<u64>> {
    let value = match args.get(name) {
        Some(JsonValue::Null) | None => return Ok(None),
        Some(v) => v,
    };

    if let Some(n) = value.as_u64() {
        return Ok(Some(n));
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
        _ => Err(McpError::invalid_arg(name, "expected a non-negative integer")),
    }
}

/// Helper to get an optional integer argument as `usize`, falling back to `default`.
pub fn get_usize_or(args: &Map<String, JsonValue>, name: &str, default: u64) -> Result<usize> {
    let n = get_optional_u64(args, name)?.unwrap_or(default);
    usize::try_from(n).map_err(|_| McpError::invalid_arg(name, "value is too large"))
}

/// Helper to get an optional non-negative number argument.
pub fn get_optional_f64(args: &Map<String, JsonValue>, name: &str) -> Result<Option<f64>> {
    match args.get(name) {
        Some(JsonValue::Null) | None => Ok(None),
        Some(v) => match v.as_f64() {
            Some(f) if f >= 0.0 && f.is_finite() => Ok(Some(f)),
            _ => Err(McpError::invalid_arg(name, "expected a non-negative number")),
        },
    }
}

/// Helper to get an optional boolean argument.
pub fn get_optional_bool(args: &Map<String, JsonValue>, name: &str) -> Result<Option<bool>> {
    match args.get(name) {
        Some(JsonValue::Bool(b)) => Ok(Some(*b)),
        Some(JsonValue::Null) | None => Ok(None),
        Some(_) => Err(McpError::invalid_arg(name, "expected a boolean")),
    }
}

/// Helper to get a required array of strings.
pub fn get_string_array_arg(args: &Map<String, JsonValue>, name: &str) -> Result<Vec<String>> {
    match args.get(name) {
        Some(JsonValue::Array(items)) => Ok(strings_of(items)),
        Some(JsonValue::Null) | None => Err(McpError::MissingArg(name.to_string())),
        Some(_) => Err(McpError::invalid_arg(name, "expected an array of strings")),
    }
}

/// Helper to get an optional array of strings.
pub fn get_optional_string_array(
    args: &Map<String, JsonValue>,
    name: &str,
) -> Result<Option<Vec<String>>> {
    match args.get(name) {
        Some(JsonValue::Array(items)) => Ok(Some(strings_of(items))),
        Some(JsonValue::Null) | None => Ok(None),
        Some(_) => Err(McpError::invalid_arg(name, "expected an array of strings")),
    }
}

/// Lenient tag list: anything that is not an array becomes empty.
pub fn coerce_tags(args: &Map<String, JsonValue>, name: &str) -> Vec<String> {
    match args.get(name) {
        Some(JsonValue::Array(items)) => strings_of(items),
        _ => Vec::new(),
    }
}

// Non-string entries are dropped.
fn strings_of(items: &[JsonValue]) -> Vec<String> {
    items
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}
