// MIST Gateway - HTTP Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Shared blocking HTTP client for the Google and Notion REST APIs.
// Maps HTTP status codes onto ToolError variants. No retries.

use crate::error::ToolError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "MIST-Gateway/0.3 (MCP)";
const TIMEOUT_SECS: u64 = 30;

/// Longest body excerpt carried into an error message
const MAX_ERROR_BODY: usize = 300;

/// HTTP client bound to one remote service
pub struct ApiClient {
    client: Client,
    service: &'static str,
}

impl ApiClient {
    pub fn new(service: &'static str) -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| ToolError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, service })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a request and parse the JSON response.
    /// Empty bodies (e.g. 204 No Content) yield Value::Null.
    pub fn send_json(&self, request: RequestBuilder) -> Result<Value, ToolError> {
        self.send_json_as(self.service, request)
    }

    /// Like send_json, with errors attributed to `service`. One client
    /// serves Gmail, Calendar and Tasks.
    pub fn send_json_as(&self, service: &'static str, request: RequestBuilder) -> Result<Value, ToolError> {
        let resp = request.send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        check_status(service, status, &body)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Map a non-2xx status onto a ToolError
pub fn check_status(service: &'static str, status: u16, body: &str) -> Result<(), ToolError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let message = error_message(body);
    Err(match status {
        401 | 403 => ToolError::Auth(format!("{} rejected the credentials (HTTP {}): {}", service, status, message)),
        404 => ToolError::NotFound(format!("{} resource not found: {}", service, message)),
        429 => ToolError::RateLimited(format!("{}: {}", service, message)),
        _ => ToolError::Api { service, status, message },
    })
}

/// Pull a readable message out of an API error body.
///
/// Google:  {"error": {"code": 404, "message": "..."}}
/// OAuth:   {"error": "invalid_grant", "error_description": "..."}
/// Notion:  {"object": "error", "code": "...", "message": "..."}
pub fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json.pointer("/error/message").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
        if let Some(desc) = json.get("error_description").and_then(|v| v.as_str()) {
            return desc.to_string();
        }
        if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response)".to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{}…", cut)
    } else {
        trimmed.to_string()
    }
}

/// Append percent-encoded path segments to a base URL.
/// Calendar IDs such as "en.usa#holiday@group.v.calendar.google.com"
/// must not be pasted into a URL raw.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ToolError> {
    let mut url = Url::parse(base)
        .map_err(|e| ToolError::Config(format!("Invalid base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ToolError::Config(format!("Base URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_pass() {
        assert!(check_status("Gmail", 200, "").is_ok());
        assert!(check_status("Gmail", 204, "").is_ok());
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let google_404 = r#"{"error": {"code": 404, "message": "Requested entity was not found."}}"#;
        assert!(matches!(check_status("Gmail", 404, google_404), Err(ToolError::NotFound(m)) if m.contains("Requested entity was not found.")));
        assert!(matches!(check_status("Gmail", 401, "{}"), Err(ToolError::Auth(_))));
        assert!(matches!(check_status("Gmail", 403, "{}"), Err(ToolError::Auth(_))));
        assert!(matches!(check_status("Tasks", 429, "{}"), Err(ToolError::RateLimited(_))));
        assert!(matches!(check_status("Notion", 500, "boom"), Err(ToolError::Api { status: 500, .. })));
    }

    #[test]
    fn error_message_formats() {
        assert_eq!(
            error_message(r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#),
            "Token has been expired or revoked."
        );
        assert_eq!(
            error_message(r#"{"object": "error", "code": "object_not_found", "message": "Could not find database"}"#),
            "Could not find database"
        );
        assert_eq!(error_message(""), "(empty response)");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let url = endpoint(
            "https://www.googleapis.com/calendar/v3",
            &["calendars", "en.usa#holiday@group.v.calendar.google.com", "events"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.usa%23holiday@group.v.calendar.google.com/events"
        );
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let url = endpoint("https://api.notion.com/v1/", &["databases", "abc"]).unwrap();
        assert_eq!(url.as_str(), "https://api.notion.com/v1/databases/abc");
    }
}
