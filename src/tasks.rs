// MIST Gateway - Tasks Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Google Tasks v1: task lists and tasks.

use crate::error::{ToolError, ToolResult};
use crate::google::GoogleClient;
use crate::http::endpoint;
use chrono::{DateTime, NaiveDate};
use serde_json::{json, Map, Value};

const SERVICE: &str = "Tasks";
const TASKS_BASE: &str = "https://tasks.googleapis.com/tasks/v1";
const MAX_TASK_LISTS: u64 = 100;

/// Optional task fields. Blank values are never sent.
#[derive(Debug, Clone, Default)]
pub struct TaskFields {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due: Option<String>,
}

/// RFC 3339 passes through. A bare YYYY-MM-DD becomes midnight UTC.
pub fn normalize_due(due: &str) -> Result<String, ToolError> {
    let due = due.trim();
    if DateTime::parse_from_rfc3339(due).is_ok() {
        return Ok(due.to_string());
    }
    if NaiveDate::parse_from_str(due, "%Y-%m-%d").is_ok() {
        return Ok(format!("{}T00:00:00.000Z", due));
    }
    Err(ToolError::invalid(
        "due",
        format!("'{}' is not an RFC 3339 date-time or a YYYY-MM-DD date", due),
    ))
}

/// JSON body holding only the non-blank fields
pub fn task_body(fields: &TaskFields) -> Result<Value, ToolError> {
    let mut body = Map::new();
    if let Some(t) = fields.title.as_deref().filter(|s| !s.trim().is_empty()) {
        body.insert("title".to_string(), json!(t));
    }
    if let Some(n) = fields.notes.as_deref().filter(|s| !s.trim().is_empty()) {
        body.insert("notes".to_string(), json!(n));
    }
    if let Some(d) = fields.due.as_deref().filter(|s| !s.trim().is_empty()) {
        body.insert("due".to_string(), json!(normalize_due(d)?));
    }
    Ok(Value::Object(body))
}

/// Title/Status/Notes/Due lines
fn task_lines(task: &Value) -> String {
    let mut out = format!(
        "Title: {}\nStatus: {}\n",
        task["title"].as_str().unwrap_or("Untitled"),
        task["status"].as_str().unwrap_or("Unknown")
    );
    if let Some(notes) = task["notes"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Notes: {}\n", notes));
    }
    if let Some(due) = task["due"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Due: {}\n", due));
    }
    out
}

pub fn format_task_lists(listing: &Value) -> String {
    let items = listing["items"].as_array().map(Vec::as_slice).unwrap_or_default();
    if items.is_empty() {
        return "No task lists found.".to_string();
    }
    let mut out = format!("Found {} task lists:\n", items.len());
    for list in items {
        out.push_str(&format!(
            "\nTitle: {}\nID: {}\n",
            list["title"].as_str().unwrap_or("Untitled"),
            list["id"].as_str().unwrap_or("Unknown")
        ));
    }
    out
}

pub fn format_task_list(task_list_id: &str, listing: &Value) -> String {
    let mut out = format!("Task List (ID: {})\n", task_list_id);
    let items = listing["items"].as_array().map(Vec::as_slice).unwrap_or_default();
    if items.is_empty() {
        out.push_str("\nNo tasks found in this list.");
        return out;
    }
    for task in items {
        out.push('\n');
        out.push_str(&task_lines(task));
        if let Some(id) = task["id"].as_str() {
            out.push_str(&format!("Task ID: {}\n", id));
        }
    }
    out
}

fn task_url(task_list_id: &str, task_id: &str) -> Result<reqwest::Url, ToolError> {
    endpoint(TASKS_BASE, &["lists", task_list_id, "tasks", task_id])
}

// ====== list_task_lists ======

pub fn list_task_lists(client: &mut GoogleClient) -> ToolResult {
    let url = endpoint(TASKS_BASE, &["users", "@me", "lists"])?;
    let listing = client.get(SERVICE, url, &[("maxResults", MAX_TASK_LISTS.to_string())])?;
    Ok(format_task_lists(&listing))
}

// ====== create_task ======

pub fn create_task(client: &mut GoogleClient, task_list_id: &str, fields: &TaskFields) -> ToolResult {
    let body = task_body(fields)?;
    let url = endpoint(TASKS_BASE, &["lists", task_list_id, "tasks"])?;
    let task = client.post(SERVICE, url, &[], &body)?;
    log::info!("Task created in {}: {}", task_list_id, task["id"].as_str().unwrap_or("?"));
    Ok(format!(
        "Task created successfully:\nID: {}\nTitle: {}\nNotes: {}\nDue: {}",
        task["id"].as_str().unwrap_or("Unknown"),
        fields.title.as_deref().unwrap_or(""),
        fields.notes.as_deref().unwrap_or(""),
        body["due"].as_str().unwrap_or("Not specified")
    ))
}

// ====== update_task ======

pub fn update_task(client: &mut GoogleClient, task_list_id: &str, task_id: &str, fields: &TaskFields) -> ToolResult {
    let body = task_body(fields)?;
    let task = client.patch(SERVICE, task_url(task_list_id, task_id)?, &body)?;
    log::info!("Task updated in {}: {}", task_list_id, task_id);
    Ok(format!("Task updated successfully (ID: {}):\n{}", task_id, task_lines(&task)))
}

// ====== complete_task ======

pub fn complete_task(client: &mut GoogleClient, task_list_id: &str, task_id: &str) -> ToolResult {
    let task = client.patch(SERVICE, task_url(task_list_id, task_id)?, &json!({"status": "completed"}))?;
    log::info!("Task completed in {}: {}", task_list_id, task_id);
    Ok(format!(
        "Task '{}' (ID: {}) marked as completed.",
        task["title"].as_str().unwrap_or("Untitled"),
        task_id
    ))
}

// ====== delete_task ======

pub fn delete_task(client: &mut GoogleClient, task_list_id: &str, task_id: &str) -> ToolResult {
    client.delete(SERVICE, task_url(task_list_id, task_id)?, &[])?;
    log::info!("Task deleted from {}: {}", task_list_id, task_id);
    Ok(format!("Task (ID: {}) deleted successfully.", task_id))
}

// ====== create_task_list ======

pub fn create_task_list(client: &mut GoogleClient, title: &str) -> ToolResult {
    let url = endpoint(TASKS_BASE, &["users", "@me", "lists"])?;
    let list = client.post(SERVICE, url, &[], &json!({"title": title}))?;
    Ok(format!(
        "Task list created successfully:\nID: {}\nTitle: {}",
        list["id"].as_str().unwrap_or("Unknown"),
        title
    ))
}

// ====== delete_task_list ======

pub fn delete_task_list(client: &mut GoogleClient, task_list_id: &str) -> ToolResult {
    let url = endpoint(TASKS_BASE, &["users", "@me", "lists", task_list_id])?;
    client.delete(SERVICE, url, &[])?;
    log::info!("Task list deleted: {}", task_list_id);
    Ok(format!("Task list (ID: {}) deleted successfully.", task_list_id))
}

// ====== resources ======

pub fn read_task_list(client: &mut GoogleClient, task_list_id: &str) -> ToolResult {
    let url = endpoint(TASKS_BASE, &["lists", task_list_id, "tasks"])?;
    Ok(format_task_list(task_list_id, &client.get(SERVICE, url, &[])?))
}

pub fn read_task(client: &mut GoogleClient, task_list_id: &str, task_id: &str) -> ToolResult {
    let task = client.get(SERVICE, task_url(task_list_id, task_id)?, &[])?;
    Ok(format!("Task (ID: {})\n{}", task_id, task_lines(&task)))
}

// ============================================================================
// TESTS
// ============================================================================
