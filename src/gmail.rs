// MIST Gateway - Gmail Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Gmail REST v1: read, search, label, draft and send.
// Outgoing mail is plain UTF-8 text, base64url-encoded into `raw`.

use crate::error::{ToolError, ToolResult};
use crate::google::GoogleClient;
use crate::http::endpoint;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

const SERVICE: &str = "Gmail";
const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
const EMAIL_PREVIEW_LENGTH: usize = 200;
const HTML_WRAP_WIDTH: usize = 100;

/// Gmail emits base64url with or without padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static DATE_RE: OnceLock<Regex> = OnceLock::new();

/// Search criteria for search_emails
#[derive(Debug, Default, Clone)]
pub struct SearchCriteria {
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub has_attachment: bool,
    pub is_unread: bool,
    pub after_date: Option<String>,
    pub before_date: Option<String>,
    pub label: Option<String>,
}

/// Outgoing message fields for compose_email / send_email
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

// ============================================================================
// MESSAGE PARSING
// ============================================================================

/// Header name -> value. Later duplicates win.
pub fn headers_map(message: &Value) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(headers) = message.pointer("/payload/headers").and_then(|v| v.as_array()) {
        for h in headers {
            if let (Some(name), Some(value)) = (h["name"].as_str(), h["value"].as_str()) {
                map.insert(name.to_string(), value.to_string());
            }
        }
    }
    map
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_LENIENT.decode(data.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Depth-first search for the first part of `mime_type` carrying data
fn find_part(part: &Value, mime_type: &str) -> Option<String> {
    if part["mimeType"].as_str() == Some(mime_type) {
        if let Some(body) = part.pointer("/body/data").and_then(|v| v.as_str()).and_then(decode_body) {
            return Some(body);
        }
    }
    part["parts"]
        .as_array()?
        .iter()
        .find_map(|child| find_part(child, mime_type))
}

/// Plain text if present, else HTML rendered to text, else the snippet
pub fn message_body(message: &Value) -> String {
    let payload = &message["payload"];
    if let Some(text) = find_part(payload, "text/plain") {
        return text;
    }
    if let Some(html) = find_part(payload, "text/html") {
        return html2text::from_read(html.as_bytes(), HTML_WRAP_WIDTH);
    }
    message["snippet"].as_str().unwrap_or_default().to_string()
}

pub fn format_message(message: &Value) -> String {
    let headers = headers_map(message);
    let get = |name: &str, default: &str| headers.get(name).cloned().unwrap_or_else(|| default.to_string());
    format!(
        "From: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}\n",
        get("From", "Unknown"),
        get("To", "Unknown"),
        get("Subject", "No Subject"),
        get("Date", "Unknown Date"),
        message_body(message)
    )
}

/// Short listing entry used by search and query results
fn format_listing(message_id: &str, message: &Value) -> String {
    let headers = headers_map(message);
    let get = |name: &str, default: &str| headers.get(name).cloned().unwrap_or_else(|| default.to_string());
    let mut out = format!(
        "\nMessage ID: {}\nFrom: {}\nSubject: {}\nDate: {}\n",
        message_id,
        get("From", "Unknown"),
        get("Subject", "No Subject"),
        get("Date", "Unknown Date")
    );
    if let Some(snippet) = message["snippet"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Preview: {}\n", snippet));
    }
    out
}

pub fn format_labels(labels: &Value) -> String {
    let mut out = String::from("Available Gmail Labels:\n");
    for label in labels["labels"].as_array().into_iter().flatten() {
        out.push_str(&format!(
            "\nLabel ID: {}\nName: {}\nType: {}\n",
            label["id"].as_str().unwrap_or("Unknown"),
            label["name"].as_str().unwrap_or("Unknown"),
            label["type"].as_str().unwrap_or("user")
        ));
    }
    out
}

// ============================================================================
// QUERY AND MESSAGE BUILDING
// ============================================================================

/// `YYYY/MM/DD` and a real calendar date
pub fn is_valid_date(s: &str) -> bool {
    let re = DATE_RE.get_or_init(|| Regex::new(r"^\d{4}/\d{2}/\d{2}$").expect("valid date regex"));
    re.is_match(s) && NaiveDate::parse_from_str(s, "%Y/%m/%d").is_ok()
}

pub fn build_search_query(criteria: &SearchCriteria) -> Result<String, ToolError> {
    for (name, value) in [("after_date", &criteria.after_date), ("before_date", &criteria.before_date)] {
        if let Some(v) = value {
            if !is_valid_date(v) {
                return Err(ToolError::message(format!(
                    "{} '{}' is not in the required format YYYY/MM/DD",
                    name, v
                )));
            }
        }
    }

    let mut parts = Vec::new();
    if let Some(from) = &criteria.from_email {
        parts.push(format!("from:{}", from));
    }
    if let Some(to) = &criteria.to_email {
        parts.push(format!("to:{}", to));
    }
    if let Some(subject) = &criteria.subject {
        if subject.contains(' ') {
            parts.push(format!("subject:\"{}\"", subject));
        } else {
            parts.push(format!("subject:{}", subject));
        }
    }
    if criteria.has_attachment {
        parts.push("has:attachment".to_string());
    }
    if criteria.is_unread {
        parts.push("is:unread".to_string());
    }
    if let Some(after) = &criteria.after_date {
        parts.push(format!("after:{}", after));
    }
    if let Some(before) = &criteria.before_date {
        parts.push(format!("before:{}", before));
    }
    if let Some(label) = &criteria.label {
        parts.push(format!("label:{}", label));
    }
    Ok(parts.join(" "))
}

/// Header values cannot carry line breaks
fn header_value(v: &str) -> String {
    v.replace(['\r', '\n'], " ")
}

/// RFC 2047 B-encoding for non-ASCII header text
pub fn encode_header(v: &str) -> String {
    let v = header_value(v);
    if v.is_ascii() {
        v
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(v.as_bytes()))
    }
}

/// RFC 5322 message text
pub fn build_mime(sender: &str, email: &OutgoingEmail) -> String {
    let mut msg = String::new();
    msg.push_str(&format!("From: {}\r\n", header_value(sender)));
    msg.push_str(&format!("To: {}\r\n", header_value(&email.to)));
    if let Some(cc) = email.cc.as_deref().filter(|s| !s.is_empty()) {
        msg.push_str(&format!("Cc: {}\r\n", header_value(cc)));
    }
    if let Some(bcc) = email.bcc.as_deref().filter(|s| !s.is_empty()) {
        msg.push_str(&format!("Bcc: {}\r\n", header_value(bcc)));
    }
    msg.push_str(&format!("Subject: {}\r\n", encode_header(&email.subject)));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
    msg.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
    msg.push_str(&email.body);
    msg
}

pub fn encode_raw(mime: &str) -> String {
    URL_SAFE.encode(mime.as_bytes())
}

/// First 200 characters, "..." appended when cut
pub fn body_preview(body: &str) -> String {
    if body.chars().count() > EMAIL_PREVIEW_LENGTH {
        let cut: String = body.chars().take(EMAIL_PREVIEW_LENGTH).collect();
        format!("{}...", cut)
    } else {
        body.to_string()
    }
}

fn confirmation(headline: String, email: &OutgoingEmail) -> String {
    format!(
        "{}\nTo: {}\nSubject: {}\nCC: {}\nBCC: {}\nBody: {}",
        headline,
        email.to,
        email.subject,
        email.cc.as_deref().unwrap_or(""),
        email.bcc.as_deref().unwrap_or(""),
        body_preview(&email.body)
    )
}

// ============================================================================
// API CALLS
// ============================================================================

/// users/{user_id}/{segments...}
fn user_url(client: &GoogleClient, segments: &[&str]) -> Result<Url, ToolError> {
    let mut all = vec!["users", client.user_id()];
    all.extend_from_slice(segments);
    endpoint(GMAIL_BASE, &all)
}

fn get_message(client: &mut GoogleClient, message_id: &str) -> Result<Value, ToolError> {
    let url = user_url(client, &["messages", message_id])?;
    client.get(SERVICE, url, &[("format", "full".to_string())])
}

fn subject_of(client: &mut GoogleClient, message_id: &str) -> Result<String, ToolError> {
    let url = user_url(client, &["messages", message_id])?;
    let message = client.get(
        SERVICE,
        url,
        &[("format", "metadata".to_string()), ("metadataHeaders", "Subject".to_string())],
    )?;
    Ok(headers_map(&message)
        .remove("Subject")
        .unwrap_or_else(|| "No Subject".to_string()))
}

fn list_message_ids(client: &mut GoogleClient, query: &str, max_results: u64) -> Result<Vec<String>, ToolError> {
    let url = user_url(client, &["messages"])?;
    let mut params = vec![("maxResults", max_results.to_string())];
    if !query.is_empty() {
        params.push(("q", query.to_string()));
    }
    let listing = client.get(SERVICE, url, &params)?;
    Ok(listing["messages"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|m| m["id"].as_str().map(str::to_string))
        .collect())
}

fn label_name(client: &mut GoogleClient, label_id: &str) -> Result<String, ToolError> {
    let url = user_url(client, &["labels"])?;
    let labels = client.get(SERVICE, url, &[])?;
    Ok(labels["labels"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|l| l["id"].as_str() == Some(label_id))
        .and_then(|l| l["name"].as_str())
        .unwrap_or(label_id)
        .to_string())
}

fn modify_labels(client: &mut GoogleClient, message_id: &str, add: &[&str], remove: &[&str]) -> Result<(), ToolError> {
    let url = user_url(client, &["messages", message_id, "modify"])?;
    client.post(SERVICE, url, &[], &json!({"addLabelIds": add, "removeLabelIds": remove}))?;
    Ok(())
}

fn sender_address(client: &mut GoogleClient) -> Result<String, ToolError> {
    let url = user_url(client, &["profile"])?;
    let profile = client.get(SERVICE, url, &[])?;
    profile["emailAddress"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ToolError::message("Gmail profile carried no email address"))
}

/// Fetch and list each id as a listing entry
fn listing_for(client: &mut GoogleClient, ids: &[String]) -> Result<String, ToolError> {
    let mut out = String::new();
    for id in ids {
        let message = get_message(client, id)?;
        out.push_str(&format_listing(id, &message));
    }
    Ok(out)
}

// ====== get_emails ======

pub fn get_emails(client: &mut GoogleClient, message_ids: &[String]) -> ToolResult {
    if message_ids.is_empty() {
        return Ok("No message IDs provided.".to_string());
    }
    let mut retrieved = Vec::new();
    let mut failed = Vec::new();
    for id in message_ids {
        match get_message(client, id) {
            Ok(message) => retrieved.push((id, message)),
            Err(e) => {
                log::warn!("Failed to fetch message {}: {}", id, e);
                failed.push((id, e.to_string()));
            }
        }
    }

    let mut out = format!("Retrieved {} emails:\n", retrieved.len());
    for (i, (id, message)) in retrieved.iter().enumerate() {
        out.push_str(&format!("\n--- Email {} (ID: {}) ---\n", i + 1, id));
        out.push_str(&format_message(message));
    }
    if !failed.is_empty() {
        out.push_str(&format!("\n\nFailed to retrieve {} emails:\n", failed.len()));
        for (i, (id, error)) in failed.iter().enumerate() {
            out.push_str(&format!("\n--- Email {} (ID: {}) ---\nError: {}\n", i + 1, id, error));
        }
    }
    Ok(out)
}

// ====== search_emails ======

pub fn search_emails(client: &mut GoogleClient, criteria: &SearchCriteria, max_results: u64) -> ToolResult {
    let query = build_search_query(criteria)?;
    let ids = list_message_ids(client, &query, max_results)?;
    Ok(format!(
        "Found {} messages matching criteria:\n{}",
        ids.len(),
        listing_for(client, &ids)?
    ))
}

// ====== query_emails ======

pub fn query_emails(client: &mut GoogleClient, query: &str, max_results: u64) -> ToolResult {
    let ids = list_message_ids(client, query, max_results)?;
    Ok(format!(
        "Found {} messages matching query: \"{}\"\n{}",
        ids.len(),
        query,
        listing_for(client, &ids)?
    ))
}

// ====== list_available_labels ======

pub fn list_available_labels(client: &mut GoogleClient) -> ToolResult {
    let url = user_url(client, &["labels"])?;
    Ok(format_labels(&client.get(SERVICE, url, &[])?))
}

// ====== mark_message_read ======

pub fn mark_message_read(client: &mut GoogleClient, message_id: &str) -> ToolResult {
    modify_labels(client, message_id, &[], &["UNREAD"])?;
    let subject = subject_of(client, message_id)?;
    Ok(format!("Message marked as read:\nID: {}\nSubject: {}", message_id, subject))
}

// ====== add_label_to_message ======

pub fn add_label_to_message(client: &mut GoogleClient, message_id: &str, label_id: &str) -> ToolResult {
    modify_labels(client, message_id, &[label_id], &[])?;
    let subject = subject_of(client, message_id)?;
    let name = label_name(client, label_id)?;
    Ok(format!(
        "Label added to message:\nID: {}\nSubject: {}\nAdded Label: {} ({})",
        message_id, subject, name, label_id
    ))
}

// ====== remove_label_from_message ======

pub fn remove_label_from_message(client: &mut GoogleClient, message_id: &str, label_id: &str) -> ToolResult {
    // Resolve the name first: a user label may be gone afterwards
    let name = label_name(client, label_id)?;
    modify_labels(client, message_id, &[], &[label_id])?;
    let subject = subject_of(client, message_id)?;
    Ok(format!(
        "Label removed from message:\nID: {}\nSubject: {}\nRemoved Label: {} ({})",
        message_id, subject, name, label_id
    ))
}

// ====== compose_email ======

pub fn compose_email(client: &mut GoogleClient, email: &OutgoingEmail) -> ToolResult {
    let sender = sender_address(client)?;
    let raw = encode_raw(&build_mime(&sender, email));
    let url = user_url(client, &["drafts"])?;
    let draft = client.post(SERVICE, url, &[], &json!({"message": {"raw": raw}}))?;
    let id = draft["id"].as_str().unwrap_or("unknown");
    log::info!("Draft created: {}", id);
    Ok(confirmation(format!("Email draft created with ID: {}", id), email))
}

// ====== send_email ======

pub fn send_email(client: &mut GoogleClient, email: &OutgoingEmail) -> ToolResult {
    let sender = sender_address(client)?;
    let raw = encode_raw(&build_mime(&sender, email));
    let url = user_url(client, &["messages", "send"])?;
    let sent = client.post(SERVICE, url, &[], &json!({"raw": raw}))?;
    let id = sent["id"].as_str().unwrap_or("unknown");
    log::info!("Email sent: {}", id);
    Ok(confirmation(format!("Email sent successfully with ID: {}", id), email))
}

// ====== resources ======

pub fn read_message(client: &mut GoogleClient, message_id: &str) -> ToolResult {
    Ok(format_message(&get_message(client, message_id)?))
}

pub fn read_thread(client: &mut GoogleClient, thread_id: &str) -> ToolResult {
    let url = user_url(client, &["threads", thread_id])?;
    let thread = client.get(SERVICE, url, &[("format", "full".to_string())])?;
    Ok(format_thread(thread_id, &thread))
}

pub fn format_thread(thread_id: &str, thread: &Value) -> String {
    let mut out = format!("Email Thread (ID: {})\n", thread_id);
    for (i, message) in thread["messages"].as_array().into_iter().flatten().enumerate() {
        out.push_str(&format!("\n--- Message {} ---\n", i + 1));
        out.push_str(&format_message(message));
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s)
    }

    fn multipart(plain: Option<&str>, html: Option<&str>) -> Value {
        let mut parts = Vec::new();
        if let Some(p) = plain {
            parts.push(json!({"mimeType": "text/plain", "body": {"data": b64(p)}}));
        }
        if let Some(h) = html {
            parts.push(json!({"mimeType": "text/html", "body": {"data": b64(h)}}));
        }
        json!({
            "id": "m1",
            "snippet": "snippet text",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "From", "value": "Ada <ada@example.com>"},
                    {"name": "Subject", "value": "Launch"}
                ],
                "parts": [{"mimeType": "multipart/alternative", "parts": parts}]
            }
        })
    }

    #[test]
    fn plain_part_is_preferred() {
        let msg = multipart(Some("plain body"), Some("<p>html body</p>"));
        assert_eq!(message_body(&msg), "plain body");
    }

    #[test]
    fn html_part_is_rendered_when_no_plain() {
        let msg = multipart(None, Some("<p>html <b>body</b></p>"));
        let body = message_body(&msg);
        assert!(body.contains("html"));
        assert!(!body.contains("<p>"));
    }

    #[test]
    fn snippet_is_last_resort() {
        assert_eq!(message_body(&multipart(None, None)), "snippet text");
    }

    #[test]
    fn padded_bodies_decode() {
        let padded = URL_SAFE.encode("ok?");
        let msg = json!({"payload": {"mimeType": "text/plain", "body": {"data": padded}}});
        assert_eq!(message_body(&msg), "ok?");
    }

    #[test]
    fn formatted_message_uses_defaults() {
        let text = format_message(&multipart(Some("hi"), None));
        assert!(text.starts_with("From: Ada <ada@example.com>\nTo: Unknown\nSubject: Launch\nDate: Unknown Date\n\nhi"));
    }

    #[test]
    fn dates_must_be_real() {
        assert!(is_valid_date("2024/02/29"));
        assert!(!is_valid_date("2023/02/29"));
        assert!(!is_valid_date("2024-01-01"));
        assert!(!is_valid_date("2024/1/1"));
    }

    #[test]
    fn search_query_joins_criteria() {
        let criteria = SearchCriteria {
            from_email: Some("ada@example.com".to_string()),
            subject: Some("quarterly report".to_string()),
            has_attachment: true,
            is_unread: true,
            after_date: Some("2024/01/01".to_string()),
            label: Some("Work".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_search_query(&criteria).unwrap(),
            "from:ada@example.com subject:\"quarterly report\" has:attachment is:unread after:2024/01/01 label:Work"
        );
    }

    #[test]
    fn bad_date_is_reported() {
        let criteria = SearchCriteria {
            before_date: Some("01/02/2024".to_string()),
            ..Default::default()
        };
        let err = build_search_query(&criteria).unwrap_err();
        assert_eq!(
            err.to_tool_text(),
            "Error: before_date '01/02/2024' is not in the required format YYYY/MM/DD"
        );
    }

    #[test]
    fn mime_message_headers() {
        let email = OutgoingEmail {
            to: "bob@example.com".to_string(),
            subject: "Grüße".to_string(),
            body: "Hallo".to_string(),
            cc: Some("carol@example.com".to_string()),
            bcc: None,
        };
        let mime = build_mime("me@example.com", &email);
        assert!(mime.starts_with("From: me@example.com\r\nTo: bob@example.com\r\nCc: carol@example.com\r\n"));
        assert!(!mime.contains("Bcc:"));
        assert!(mime.contains("Subject: =?utf-8?B?"));
        assert!(mime.ends_with("\r\n\r\nHallo"));

        let decoded = URL_SAFE.decode(encode_raw(&mime)).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), mime);
    }

    #[test]
    fn header_injection_is_flattened() {
        assert_eq!(encode_header("Hi\r\nBcc: evil@example.com"), "Hi  Bcc: evil@example.com");
    }

    #[test]
    fn preview_cuts_at_200_chars() {
        assert_eq!(body_preview("short"), "short");
        let long = "é".repeat(250);
        let preview = body_preview(&long);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn labels_listing() {
        let labels = json!({"labels": [{"id": "INBOX", "name": "INBOX", "type": "system"}, {"id": "Label_1", "name": "Work"}]});
        let text = format_labels(&labels);
        assert!(text.contains("Label ID: INBOX\nName: INBOX\nType: system"));
        assert!(text.contains("Label ID: Label_1\nName: Work\nType: user"));
    }

    #[test]
    fn thread_lists_each_message() {
        let thread = json!({"messages": [multipart(Some("one"), None), multipart(Some("two"), None)]});
        let text = format_thread("t1", &thread);
        assert!(text.starts_with("Email Thread (ID: t1)\n"));
        assert!(text.contains("--- Message 2 ---"));
    }
}
