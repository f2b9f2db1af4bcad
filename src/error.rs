// MIST Gateway - Tool Errors
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Every tool handler returns Result<String, ToolError>. The MCP layer turns
// an Err into "Error: {message}" with isError set. Nothing is retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// Message is shown verbatim after the "Error: " prefix
    #[error("{0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("{service} API error (HTTP {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Already-formatted failure text, e.g. a validation message
    #[error("{0}")]
    Message(String),
}

pub type ToolResult = Result<String, ToolError>;

/// resources/read failures. An unknown URI is a client error (-32602),
/// a failed fetch an internal one (-32603).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Unknown resource: {0}")]
    UnknownUri(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl ResourceError {
    pub fn rpc_code(&self) -> i64 {
        match self {
            ResourceError::UnknownUri(_) => -32602,
            ResourceError::Tool(_) => -32603,
        }
    }
}

impl ToolError {
    pub fn missing(name: &str) -> Self {
        ToolError::MissingParam(name.to_string())
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ToolError::NotFound(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        ToolError::Auth(message.into())
    }

    pub fn message(message: impl Into<String>) -> Self {
        ToolError::Message(message.into())
    }

    /// Text returned to the assistant for a failed call
    pub fn to_tool_text(&self) -> String {
        format!("Error: {}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_text_is_prefixed() {
        let err = ToolError::missing("title");
        assert_eq!(err.to_tool_text(), "Error: Missing required parameter: title");
    }

    #[test]
    fn not_found_is_verbatim() {
        let err = ToolError::not_found("Note not found with ID: abc");
        assert_eq!(err.to_tool_text(), "Error: Note not found with ID: abc");
    }

    #[test]
    fn api_error_names_service_and_status() {
        let err = ToolError::Api {
            service: "Gmail",
            status: 500,
            message: "Backend Error".to_string(),
        };
        assert_eq!(err.to_string(), "Gmail API error (HTTP 500): Backend Error");
    }

    #[test]
    fn resource_errors_map_to_rpc_codes() {
        assert_eq!(ResourceError::UnknownUri("x://y".to_string()).rpc_code(), -32602);
        let failed: ResourceError = ToolError::not_found("gone").into();
        assert_eq!(failed.rpc_code(), -32603);
        assert_eq!(failed.to_string(), "gone");
    }
}
