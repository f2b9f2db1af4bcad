// MIST Gateway - Tool Argument Helpers
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Tool arguments arrive as loosely typed JSON. These helpers read them
// and produce ToolError::MissingParam / InvalidParam on bad input.

use crate::error::ToolError;
use serde_json::Value;

/// Required string. Missing, null or blank is an error.
pub fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    optional_str(args, name).ok_or_else(|| ToolError::missing(name))
}

/// Optional string. Missing, null, non-string or blank yields None.
pub fn optional_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Optional non-negative integer. Accepts a JSON number or a numeric string.
pub fn optional_u64(args: &Value, name: &str, default: u64) -> Result<u64, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ToolError::invalid(name, "expected a non-negative integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| ToolError::invalid(name, format!("'{}' is not a non-negative integer", s))),
        Some(_) => Err(ToolError::invalid(name, "expected a non-negative integer")),
    }
}

/// Optional boolean, false when absent. Accepts "true"/"false" strings.
pub fn optional_bool(args: &Value, name: &str) -> Result<bool, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            other => Err(ToolError::invalid(name, format!("'{}' is not a boolean", other))),
        },
        Some(_) => Err(ToolError::invalid(name, "expected a boolean")),
    }
}

/// String list. Accepts a JSON array of strings or a comma-separated string.
/// Blank entries are dropped.
pub fn string_list(args: &Value, name: &str) -> Result<Vec<String>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Some(_) => {}
                    None => return Err(ToolError::invalid(name, "expected a list of strings")),
                }
            }
            Ok(out)
        }
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        Some(_) => Err(ToolError::invalid(name, "expected a list of strings")),
    }
}

/// String list that must contain at least one entry
pub fn required_list(args: &Value, name: &str) -> Result<Vec<String>, ToolError> {
    let list = string_list(args, name)?;
    if list.is_empty() {
        return Err(ToolError::missing(name));
    }
    Ok(list)
}

/// Optional JSON object or array, passed through to an API as-is.
/// A string holding JSON is parsed, since some clients stringify nested values.
pub fn optional_json(args: &Value, name: &str) -> Result<Option<Value>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| ToolError::invalid(name, format!("not valid JSON: {}", e))),
        Some(v) => Ok(Some(v.clone())),
    }
}

pub fn required_json(args: &Value, name: &str) -> Result<Value, ToolError> {
    optional_json(args, name)?.ok_or_else(|| ToolError::missing(name))
}
