// MIST Gateway - Tool Registry & Dispatch
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Tool definitions (JSON schema per tool), grouped so whole groups can be
// switched off, and the dispatch from tool name to handler.
// Google and Notion clients are created on first use.

use crate::calendar::{self, EventPatch, EventQuery, NewEvent};
use crate::config::{MistConfig, ToolGroup};
use crate::error::{ResourceError, ToolError, ToolResult};
use crate::git::Git;
use crate::gmail::{self, OutgoingEmail, SearchCriteria};
use crate::google::GoogleClient;
use crate::notes::NoteStore;
use crate::notion::{NotionClient, Paging};
use crate::params::{
    optional_bool, optional_json, optional_str, optional_u64, required_json, required_list, required_str,
    string_list,
};
use crate::resources::{self, Resource};
use crate::tasks::{self, TaskFields};
use serde_json::{json, Value};

/// Text result of one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput {
    pub text: String,
    pub is_error: bool,
}

/// MCP tool definition helper
fn tool_def(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Which group a tool belongs to
pub fn tool_group(name: &str) -> Option<ToolGroup> {
    match name {
        "add_note" | "read_note" | "list_notes" | "generate_note_summary" | "search_notes" | "edit_note"
        | "delete_note" | "organize_notes_by_subject" => Some(ToolGroup::Notes),
        "get_emails" | "search_emails" | "query_emails" | "list_available_labels" | "mark_message_read"
        | "add_label_to_message" | "remove_label_from_message" | "compose_email" | "send_email" => {
            Some(ToolGroup::Mail)
        }
        "list_calendars" | "create_event" | "update_event" | "delete_event" | "search_events" => {
            Some(ToolGroup::Calendar)
        }
        "list_task_lists" | "create_task" | "update_task" | "complete_task" | "delete_task"
        | "create_task_list" | "delete_task_list" => Some(ToolGroup::Tasks),
        n if n.starts_with("git_") => Some(ToolGroup::Git),
        n if n.starts_with("notion_") => Some(ToolGroup::Notion),
        _ => None,
    }
}

/// Definitions for one group
fn group_definitions(group: ToolGroup) -> Vec<Value> {
    match group {
        ToolGroup::Notes => note_tools(),
        ToolGroup::Mail => mail_tools(),
        ToolGroup::Calendar => calendar_tools(),
        ToolGroup::Tasks => task_tools(),
        ToolGroup::Git => git_tools(),
        ToolGroup::Notion => notion_tools(),
    }
}

fn note_tools() -> Vec<Value> {
    vec![
        tool_def(
            "add_note",
            "Create a new note. #hashtags in the content become tags.",
            json!({
                "title": {"type": "string", "description": "Note title"},
                "content": {"type": "string", "description": "Markdown content"},
                "subject": {"type": "string", "description": "Optional subject used for grouping"}
            }),
            vec!["title", "content"],
        ),
        tool_def(
            "read_note",
            "Read a note by ID, or by title (case-insensitive).",
            json!({
                "note_id": {"type": "string", "description": "Note ID"},
                "title": {"type": "string", "description": "Note title"}
            }),
            vec![],
        ),
        tool_def(
            "list_notes",
            "List notes, newest first. Optionally filter by subject or tag.",
            json!({
                "subject": {"type": "string", "description": "Exact subject"},
                "tag": {"type": "string", "description": "Tag without the #"},
                "limit": {"type": "integer", "description": "Maximum notes to list (default 10)"}
            }),
            vec![],
        ),
        tool_def(
            "generate_note_summary",
            "Summarize a note: its headings and the first sentence of each paragraph.",
            json!({
                "note_id": {"type": "string", "description": "Note ID"},
                "title": {"type": "string", "description": "Note title"}
            }),
            vec![],
        ),
        tool_def(
            "search_notes",
            "Search notes by title and content. A query starting with # searches tags.",
            json!({
                "query": {"type": "string", "description": "Search text or #tag"}
            }),
            vec!["query"],
        ),
        tool_def(
            "edit_note",
            "Replace a note's content. Title, subject and created date are kept.",
            json!({
                "note_id": {"type": "string", "description": "Note ID"},
                "new_content": {"type": "string", "description": "New markdown content"}
            }),
            vec!["note_id", "new_content"],
        ),
        tool_def(
            "delete_note",
            "Delete a note and remove it from the indexes.",
            json!({
                "note_id": {"type": "string", "description": "Note ID"}
            }),
            vec!["note_id"],
        ),
        tool_def(
            "organize_notes_by_subject",
            "List all notes grouped by subject.",
            json!({}),
            vec![],
        ),
    ]
}

fn mail_tools() -> Vec<Value> {
    let outgoing = json!({
        "to": {"type": "string", "description": "Recipient address(es), comma-separated"},
        "subject": {"type": "string", "description": "Subject line"},
        "body": {"type": "string", "description": "Plain-text body"},
        "cc": {"type": "string", "description": "CC recipients"},
        "bcc": {"type": "string", "description": "BCC recipients"}
    });
    vec![
        tool_def(
            "get_emails",
            "Fetch one or more Gmail messages by ID.",
            json!({
                "message_ids": {"type": "array", "items": {"type": "string"}, "description": "Gmail message IDs"}
            }),
            vec!["message_ids"],
        ),
        tool_def(
            "search_emails",
            "Search Gmail with structured criteria. Dates use YYYY/MM/DD.",
            json!({
                "from_email": {"type": "string", "description": "Sender"},
                "to_email": {"type": "string", "description": "Recipient"},
                "subject": {"type": "string", "description": "Subject text"},
                "has_attachment": {"type": "boolean", "description": "Only messages with attachments"},
                "is_unread": {"type": "boolean", "description": "Only unread messages"},
                "after_date": {"type": "string", "description": "After this date (YYYY/MM/DD)"},
                "before_date": {"type": "string", "description": "Before this date (YYYY/MM/DD)"},
                "label": {"type": "string", "description": "Gmail label"},
                "max_results": {"type": "integer", "description": "Maximum messages (default 10)"}
            }),
            vec![],
        ),
        tool_def(
            "query_emails",
            "Search Gmail with a raw query, same syntax as the Gmail search box.",
            json!({
                "query": {"type": "string", "description": "Gmail search query"},
                "max_results": {"type": "integer", "description": "Maximum messages (default 10)"}
            }),
            vec!["query"],
        ),
        tool_def("list_available_labels", "List Gmail labels with their IDs.", json!({}), vec![]),
        tool_def(
            "mark_message_read",
            "Mark a message as read.",
            json!({
                "message_id": {"type": "string", "description": "Gmail message ID"}
            }),
            vec!["message_id"],
        ),
        tool_def(
            "add_label_to_message",
            "Add a label to a message. See list_available_labels for IDs.",
            json!({
                "message_id": {"type": "string", "description": "Gmail message ID"},
                "label_id": {"type": "string", "description": "Gmail label ID"}
            }),
            vec!["message_id", "label_id"],
        ),
        tool_def(
            "remove_label_from_message",
            "Remove a label from a message.",
            json!({
                "message_id": {"type": "string", "description": "Gmail message ID"},
                "label_id": {"type": "string", "description": "Gmail label ID"}
            }),
            vec!["message_id", "label_id"],
        ),
        tool_def(
            "compose_email",
            "Create a Gmail draft without sending it.",
            outgoing.clone(),
            vec!["to", "subject", "body"],
        ),
        tool_def("send_email", "Send an email.", outgoing, vec!["to", "subject", "body"]),
    ]
}

fn calendar_tools() -> Vec<Value> {
    vec![
        tool_def("list_calendars", "List calendars available to the user.", json!({}), vec![]),
        tool_def(
            "create_event",
            "Create a calendar event. Times are RFC 3339, e.g. 2024-06-03T10:00:00-07:00.",
            json!({
                "calendar_id": {"type": "string", "description": "Calendar ID ('primary' for the main calendar)"},
                "title": {"type": "string", "description": "Event title"},
                "start_datetime": {"type": "string", "description": "Start time (RFC 3339)"},
                "end_datetime": {"type": "string", "description": "End time (RFC 3339)"},
                "description": {"type": "string", "description": "Event description"},
                "location": {"type": "string", "description": "Event location"},
                "attendees": {"type": "array", "items": {"type": "string"}, "description": "Attendee emails"},
                "timezone": {"type": "string", "description": "IANA timezone (default UTC)"}
            }),
            vec!["calendar_id", "title", "start_datetime", "end_datetime"],
        ),
        tool_def(
            "update_event",
            "Update fields of an existing event. Omitted fields are unchanged.",
            json!({
                "calendar_id": {"type": "string", "description": "Calendar ID"},
                "event_id": {"type": "string", "description": "Event ID"},
                "title": {"type": "string", "description": "New title"},
                "start_datetime": {"type": "string", "description": "New start time (RFC 3339)"},
                "end_datetime": {"type": "string", "description": "New end time (RFC 3339)"},
                "description": {"type": "string", "description": "New description"},
                "location": {"type": "string", "description": "New location"}
            }),
            vec!["calendar_id", "event_id"],
        ),
        tool_def(
            "delete_event",
            "Delete a calendar event.",
            json!({
                "calendar_id": {"type": "string", "description": "Calendar ID"},
                "event_id": {"type": "string", "description": "Event ID"}
            }),
            vec!["calendar_id", "event_id"],
        ),
        tool_def(
            "search_events",
            "Search upcoming events in a calendar.",
            json!({
                "calendar_id": {"type": "string", "description": "Calendar ID"},
                "query": {"type": "string", "description": "Search text"},
                "max_results": {"type": "integer", "description": "Maximum events (default 10)"},
                "time_min": {"type": "string", "description": "Window start (RFC 3339, default now)"},
                "time_max": {"type": "string", "description": "Window end (RFC 3339)"}
            }),
            vec!["calendar_id", "query"],
        ),
    ]
}

fn task_tools() -> Vec<Value> {
    let list_id = json!({"type": "string", "description": "Task list ID"});
    let task_id = json!({"type": "string", "description": "Task ID"});
    vec![
        tool_def("list_task_lists", "List the user's task lists.", json!({}), vec![]),
        tool_def(
            "create_task",
            "Create a task. Due accepts RFC 3339 or YYYY-MM-DD.",
            json!({
                "task_list_id": list_id,
                "title": {"type": "string", "description": "Task title"},
                "notes": {"type": "string", "description": "Task notes"},
                "due": {"type": "string", "description": "Due date"}
            }),
            vec!["task_list_id", "title"],
        ),
        tool_def(
            "update_task",
            "Update a task's title, notes or due date.",
            json!({
                "task_list_id": list_id,
                "task_id": task_id,
                "title": {"type": "string", "description": "New title"},
                "notes": {"type": "string", "description": "New notes"},
                "due": {"type": "string", "description": "New due date"}
            }),
            vec!["task_list_id", "task_id"],
        ),
        tool_def(
            "complete_task",
            "Mark a task as completed.",
            json!({"task_list_id": list_id, "task_id": task_id}),
            vec!["task_list_id", "task_id"],
        ),
        tool_def(
            "delete_task",
            "Delete a task.",
            json!({"task_list_id": list_id, "task_id": task_id}),
            vec!["task_list_id", "task_id"],
        ),
        tool_def(
            "create_task_list",
            "Create a task list.",
            json!({"title": {"type": "string", "description": "Task list title"}}),
            vec!["title"],
        ),
        tool_def(
            "delete_task_list",
            "Delete a task list and its tasks.",
            json!({"task_list_id": list_id}),
            vec!["task_list_id"],
        ),
    ]
}

fn git_tools() -> Vec<Value> {
    let repo = json!({"type": "string", "description": "Path to the repository"});
    let only_repo = json!({"repo_path": repo});
    vec![
        tool_def("git_status", "Show the working tree status.", only_repo.clone(), vec!["repo_path"]),
        tool_def("git_diff_unstaged", "Show unstaged changes.", only_repo.clone(), vec!["repo_path"]),
        tool_def("git_diff_staged", "Show staged changes.", only_repo.clone(), vec!["repo_path"]),
        tool_def(
            "git_diff",
            "Show differences between the working tree and a branch or commit.",
            json!({"repo_path": repo, "target": {"type": "string", "description": "Branch, tag or commit"}}),
            vec!["repo_path", "target"],
        ),
        tool_def(
            "git_commit",
            "Commit staged changes.",
            json!({"repo_path": repo, "message": {"type": "string", "description": "Commit message"}}),
            vec!["repo_path", "message"],
        ),
        tool_def(
            "git_add",
            "Stage files. Paths are relative to the repository.",
            json!({"repo_path": repo, "files": {"type": "array", "items": {"type": "string"}, "description": "Files to stage"}}),
            vec!["repo_path", "files"],
        ),
        tool_def("git_reset", "Unstage all staged changes.", only_repo.clone(), vec!["repo_path"]),
        tool_def(
            "git_log",
            "Show recent commits.",
            json!({"repo_path": repo, "max_count": {"type": "integer", "description": "Number of commits (default 10)"}}),
            vec!["repo_path"],
        ),
        tool_def(
            "git_create_branch",
            "Create a branch from a base branch (default: current branch).",
            json!({
                "repo_path": repo,
                "branch_name": {"type": "string", "description": "New branch name"},
                "base_branch": {"type": "string", "description": "Base branch"}
            }),
            vec!["repo_path", "branch_name"],
        ),
        tool_def(
            "git_checkout",
            "Switch branches.",
            json!({"repo_path": repo, "branch_name": {"type": "string", "description": "Branch to check out"}}),
            vec!["repo_path", "branch_name"],
        ),
        tool_def(
            "git_show",
            "Show a commit and its diff.",
            json!({"repo_path": repo, "revision": {"type": "string", "description": "Commit, branch or tag"}}),
            vec!["repo_path", "revision"],
        ),
        tool_def(
            "git_init",
            "Create a new repository, creating the directory if needed.",
            only_repo.clone(),
            vec!["repo_path"],
        ),
        tool_def("git_branch_list", "List local branches.", only_repo.clone(), vec!["repo_path"]),
        tool_def("git_remote_list", "List remotes.", only_repo.clone(), vec!["repo_path"]),
        tool_def("git_stash_list", "List stashes.", only_repo, vec!["repo_path"]),
        tool_def(
            "git_remote_add",
            "Add a remote.",
            json!({
                "repo_path": repo,
                "name": {"type": "string", "description": "Remote name"},
                "url": {"type": "string", "description": "Remote URL"}
            }),
            vec!["repo_path", "name", "url"],
        ),
        tool_def(
            "git_pull",
            "Pull from a remote.",
            json!({
                "repo_path": repo,
                "remote": {"type": "string", "description": "Remote name (default origin)"},
                "branch": {"type": "string", "description": "Branch to pull"}
            }),
            vec!["repo_path"],
        ),
        tool_def(
            "git_push",
            "Push to a remote.",
            json!({
                "repo_path": repo,
                "remote": {"type": "string", "description": "Remote name (default origin)"},
                "branch": {"type": "string", "description": "Branch to push"}
            }),
            vec!["repo_path"],
        ),
    ]
}

fn notion_tools() -> Vec<Value> {
    let cursor = json!({"type": "string", "description": "Pagination cursor from a previous response"});
    let page_size = json!({"type": "integer", "description": "Results per page (max 100)"});
    vec![
        tool_def("notion_list_databases", "List Notion databases shared with the integration.", json!({}), vec![]),
        tool_def(
            "notion_get_database",
            "Get a Notion database's schema and metadata.",
            json!({"database_id": {"type": "string", "description": "Database ID"}}),
            vec!["database_id"],
        ),
        tool_def(
            "notion_query_database",
            "Query a Notion database with an optional filter and sorts.",
            json!({
                "database_id": {"type": "string", "description": "Database ID"},
                "filter": {"type": "object", "description": "Notion filter object"},
                "sorts": {"type": "array", "items": {"type": "object"}, "description": "Notion sort objects"},
                "start_cursor": cursor,
                "page_size": page_size
            }),
            vec!["database_id"],
        ),
        tool_def(
            "notion_create_page",
            "Create a page in a Notion database.",
            json!({
                "database_id": {"type": "string", "description": "Parent database ID"},
                "properties": {"type": "object", "description": "Page properties matching the database schema"},
                "children": {"type": "array", "items": {"type": "object"}, "description": "Content blocks"}
            }),
            vec!["database_id", "properties"],
        ),
        tool_def(
            "notion_update_page",
            "Update a Notion page's properties, or archive it.",
            json!({
                "page_id": {"type": "string", "description": "Page ID"},
                "properties": {"type": "object", "description": "Properties to update"},
                "archived": {"type": "boolean", "description": "Archive the page"}
            }),
            vec!["page_id", "properties"],
        ),
        tool_def(
            "notion_get_block_children",
            "Get the child blocks (content) of a page or block.",
            json!({
                "block_id": {"type": "string", "description": "Page or block ID"},
                "start_cursor": cursor,
                "page_size": page_size
            }),
            vec!["block_id"],
        ),
        tool_def(
            "notion_search",
            "Search Notion pages and databases.",
            json!({
                "query": {"type": "string", "description": "Search text"},
                "filter": {"type": "object", "description": "Notion search filter"},
                "sort": {"type": "object", "description": "Notion search sort"},
                "start_cursor": cursor,
                "page_size": page_size
            }),
            vec![],
        ),
    ]
}

/// Summarize tool params for logging (large text fields by length only)
fn param_summary(args: &Value) -> String {
    let Some(obj) = args.as_object() else {
        return String::new();
    };
    let mut parts = Vec::new();
    for (key, value) in obj {
        let shown = match (key.as_str(), value) {
            ("content" | "new_content" | "body" | "properties" | "children", v) => {
                format!("<{} bytes>", v.to_string().len())
            }
            (_, Value::String(s)) if s.chars().count() > 80 => {
                format!("{}…", s.chars().take(80).collect::<String>())
            }
            (_, Value::String(s)) => s.clone(),
            (_, v) => v.to_string(),
        };
        parts.push(format!("{}={}", key, shown));
    }
    parts.join(" ")
}

fn paging(args: &Value) -> Result<Paging, ToolError> {
    let page_size = match args.get("page_size") {
        None | Some(Value::Null) => None,
        Some(_) => Some(optional_u64(args, "page_size", 0)?),
    };
    Ok(Paging {
        start_cursor: optional_str(args, "start_cursor").map(str::to_string),
        page_size,
    })
}

fn owned(args: &Value, name: &str) -> Option<String> {
    optional_str(args, name).map(str::to_string)
}

fn outgoing_email(args: &Value) -> Result<OutgoingEmail, ToolError> {
    Ok(OutgoingEmail {
        to: required_str(args, "to")?.to_string(),
        subject: required_str(args, "subject")?.to_string(),
        body: required_str(args, "body")?.to_string(),
        cc: owned(args, "cc"),
        bcc: owned(args, "bcc"),
    })
}

/// Server state shared across calls
pub struct Gateway {
    config: MistConfig,
    notes: NoteStore,
    git: Git,
    google: Option<GoogleClient>,
    notion: Option<NotionClient>,
}

impl Gateway {
    pub fn new(config: MistConfig) -> Self {
        Self {
            notes: NoteStore::new(&config.notes_dir),
            git: Git::new(&config.git_binary),
            config,
            google: None,
            notion: None,
        }
    }

    pub fn config(&self) -> &MistConfig {
        &self.config
    }

    fn google(&mut self) -> Result<&mut GoogleClient, ToolError> {
        if self.google.is_none() {
            self.google = Some(GoogleClient::connect(&self.config.google)?);
        }
        self.google
            .as_mut()
            .ok_or_else(|| ToolError::auth("Google client unavailable"))
    }

    fn notion(&mut self) -> Result<&NotionClient, ToolError> {
        if self.notion.is_none() {
            self.notion = Some(NotionClient::new(&self.config.notion)?);
        }
        self.notion
            .as_ref()
            .ok_or_else(|| ToolError::auth("Notion client unavailable"))
    }

    fn google_max_results(&self) -> u64 {
        self.config.google.max_results
    }

    /// Definitions for every enabled group, in group order
    pub fn tool_definitions(&self) -> Vec<Value> {
        ToolGroup::ALL
            .iter()
            .filter(|g| self.config.is_enabled(**g))
            .flat_map(|g| group_definitions(*g))
            .collect()
    }

    /// Run a tool and render the outcome as MCP text
    pub fn call(&mut self, name: &str, args: &Value) -> CallOutput {
        let enabled = tool_group(name)
            .filter(|g| self.config.is_enabled(*g))
            .map_or(false, |g| group_definitions(g).iter().any(|d| d["name"] == name));
        if !enabled {
            log::warn!("Unknown tool: {}", name);
            return CallOutput {
                text: format!("Unknown tool: {}", name),
                is_error: true,
            };
        }

        log::info!("CALL {} | {}", name, param_summary(args));
        match self.handle_tool_call(name, args) {
            Ok(text) => CallOutput { text, is_error: false },
            Err(e) => {
                log::warn!("FAIL {} | {}", name, e);
                CallOutput {
                    text: e.to_tool_text(),
                    is_error: true,
                }
            }
        }
    }

    fn handle_tool_call(&mut self, name: &str, args: &Value) -> ToolResult {
        match name {
            // ====== NOTES ======
            "add_note" => {
                let title = required_str(args, "title")?;
                let content = required_str(args, "content")?;
                self.notes.add_note(title, content, optional_str(args, "subject"))
            }
            "read_note" => self
                .notes
                .read_note(optional_str(args, "note_id"), optional_str(args, "title")),
            "list_notes" => {
                let limit = optional_u64(args, "limit", 10)? as usize;
                self.notes
                    .list_notes(optional_str(args, "subject"), optional_str(args, "tag"), limit)
            }
            "generate_note_summary" => self
                .notes
                .generate_summary(optional_str(args, "note_id"), optional_str(args, "title")),
            "search_notes" => self.notes.search_notes(required_str(args, "query")?),
            "edit_note" => {
                let note_id = required_str(args, "note_id")?;
                let content = required_str(args, "new_content")?;
                self.notes.edit_note(note_id, content)
            }
            "delete_note" => self.notes.delete_note(required_str(args, "note_id")?),
            "organize_notes_by_subject" => self.notes.organize_by_subject(),

            // ====== MAIL ======
            "get_emails" => {
                if args.get("message_ids").map_or(true, Value::is_null) {
                    return Err(ToolError::missing("message_ids"));
                }
                let ids = string_list(args, "message_ids")?;
                if ids.is_empty() {
                    return Ok("No message IDs provided.".to_string());
                }
                gmail::get_emails(self.google()?, &ids)
            }
            "search_emails" => {
                let criteria = SearchCriteria {
                    from_email: owned(args, "from_email"),
                    to_email: owned(args, "to_email"),
                    subject: owned(args, "subject"),
                    has_attachment: optional_bool(args, "has_attachment")?,
                    is_unread: optional_bool(args, "is_unread")?,
                    after_date: owned(args, "after_date"),
                    before_date: owned(args, "before_date"),
                    label: owned(args, "label"),
                };
                // Date errors surface before any network call
                gmail::build_search_query(&criteria)?;
                let max = optional_u64(args, "max_results", self.google_max_results())?;
                gmail::search_emails(self.google()?, &criteria, max)
            }
            "query_emails" => {
                let query = required_str(args, "query")?;
                let max = optional_u64(args, "max_results", self.google_max_results())?;
                gmail::query_emails(self.google()?, query, max)
            }
            "list_available_labels" => gmail::list_available_labels(self.google()?),
            "mark_message_read" => {
                let id = required_str(args, "message_id")?;
                gmail::mark_message_read(self.google()?, id)
            }
            "add_label_to_message" => {
                let id = required_str(args, "message_id")?;
                let label = required_str(args, "label_id")?;
                gmail::add_label_to_message(self.google()?, id, label)
            }
            "remove_label_from_message" => {
                let id = required_str(args, "message_id")?;
                let label = required_str(args, "label_id")?;
                gmail::remove_label_from_message(self.google()?, id, label)
            }
            "compose_email" => {
                let email = outgoing_email(args)?;
                gmail::compose_email(self.google()?, &email)
            }
            "send_email" => {
                let email = outgoing_email(args)?;
                gmail::send_email(self.google()?, &email)
            }

            // ====== CALENDAR ======
            "list_calendars" => calendar::list_calendars(self.google()?),
            "create_event" => {
                let calendar_id = required_str(args, "calendar_id")?;
                let event = NewEvent {
                    title: required_str(args, "title")?.to_string(),
                    start: required_str(args, "start_datetime")?.to_string(),
                    end: required_str(args, "end_datetime")?.to_string(),
                    description: owned(args, "description"),
                    location: owned(args, "location"),
                    attendees: string_list(args, "attendees")?,
                    timezone: owned(args, "timezone"),
                };
                calendar::validate_range(&event.start, &event.end)?;
                calendar::create_event(self.google()?, calendar_id, &event)
            }
            "update_event" => {
                let calendar_id = required_str(args, "calendar_id")?;
                let event_id = required_str(args, "event_id")?;
                let patch = EventPatch {
                    title: owned(args, "title"),
                    start: owned(args, "start_datetime"),
                    end: owned(args, "end_datetime"),
                    description: owned(args, "description"),
                    location: owned(args, "location"),
                };
                calendar::update_event(self.google()?, calendar_id, event_id, &patch)
            }
            "delete_event" => {
                let calendar_id = required_str(args, "calendar_id")?;
                let event_id = required_str(args, "event_id")?;
                calendar::delete_event(self.google()?, calendar_id, event_id)
            }
            "search_events" => {
                let calendar_id = required_str(args, "calendar_id")?;
                let q = EventQuery {
                    query: Some(required_str(args, "query")?.to_string()),
                    max_results: optional_u64(args, "max_results", 10)?,
                    time_min: owned(args, "time_min"),
                    time_max: owned(args, "time_max"),
                };
                calendar::search_events(self.google()?, calendar_id, &q)
            }

            // ====== TASKS ======
            "list_task_lists" => tasks::list_task_lists(self.google()?),
            "create_task" => {
                let list_id = required_str(args, "task_list_id")?;
                let fields = TaskFields {
                    title: Some(required_str(args, "title")?.to_string()),
                    notes: owned(args, "notes"),
                    due: owned(args, "due"),
                };
                tasks::task_body(&fields)?;
                tasks::create_task(self.google()?, list_id, &fields)
            }
            "update_task" => {
                let list_id = required_str(args, "task_list_id")?;
                let task_id = required_str(args, "task_id")?;
                let fields = TaskFields {
                    title: owned(args, "title"),
                    notes: owned(args, "notes"),
                    due: owned(args, "due"),
                };
                tasks::task_body(&fields)?;
                tasks::update_task(self.google()?, list_id, task_id, &fields)
            }
            "complete_task" => {
                let list_id = required_str(args, "task_list_id")?;
                let task_id = required_str(args, "task_id")?;
                tasks::complete_task(self.google()?, list_id, task_id)
            }
            "delete_task" => {
                let list_id = required_str(args, "task_list_id")?;
                let task_id = required_str(args, "task_id")?;
                tasks::delete_task(self.google()?, list_id, task_id)
            }
            "create_task_list" => {
                let title = required_str(args, "title")?;
                tasks::create_task_list(self.google()?, title)
            }
            "delete_task_list" => {
                let list_id = required_str(args, "task_list_id")?;
                tasks::delete_task_list(self.google()?, list_id)
            }

            // ====== GIT ======
            "git_status" => self.git.status(required_str(args, "repo_path")?),
            "git_diff_unstaged" => self.git.diff_unstaged(required_str(args, "repo_path")?),
            "git_diff_staged" => self.git.diff_staged(required_str(args, "repo_path")?),
            "git_diff" => {
                let repo = required_str(args, "repo_path")?;
                self.git.diff(repo, required_str(args, "target")?)
            }
            "git_commit" => {
                let repo = required_str(args, "repo_path")?;
                self.git.commit(repo, required_str(args, "message")?)
            }
            "git_add" => {
                let repo = required_str(args, "repo_path")?;
                self.git.add(repo, &required_list(args, "files")?)
            }
            "git_reset" => self.git.reset(required_str(args, "repo_path")?),
            "git_log" => {
                let repo = required_str(args, "repo_path")?;
                self.git.log(repo, optional_u64(args, "max_count", 10)?)
            }
            "git_create_branch" => {
                let repo = required_str(args, "repo_path")?;
                let branch = required_str(args, "branch_name")?;
                self.git.create_branch(repo, branch, optional_str(args, "base_branch"))
            }
            "git_checkout" => {
                let repo = required_str(args, "repo_path")?;
                self.git.checkout(repo, required_str(args, "branch_name")?)
            }
            "git_show" => {
                let repo = required_str(args, "repo_path")?;
                self.git.show(repo, required_str(args, "revision")?)
            }
            "git_init" => self.git.init(required_str(args, "repo_path")?),
            "git_branch_list" => self.git.branch_list(required_str(args, "repo_path")?),
            "git_remote_list" => self.git.remote_list(required_str(args, "repo_path")?),
            "git_stash_list" => self.git.stash_list(required_str(args, "repo_path")?),
            "git_remote_add" => {
                let repo = required_str(args, "repo_path")?;
                let remote = required_str(args, "name")?;
                self.git.remote_add(repo, remote, required_str(args, "url")?)
            }
            "git_pull" => {
                let repo = required_str(args, "repo_path")?;
                let remote = optional_str(args, "remote").unwrap_or("origin");
                self.git.pull(repo, remote, optional_str(args, "branch"))
            }
            "git_push" => {
                let repo = required_str(args, "repo_path")?;
                let remote = optional_str(args, "remote").unwrap_or("origin");
                self.git.push(repo, remote, optional_str(args, "branch"))
            }

            // ====== NOTION ======
            "notion_list_databases" => self.notion()?.list_databases(),
            "notion_get_database" => {
                let id = required_str(args, "database_id")?;
                self.notion()?.get_database(id)
            }
            "notion_query_database" => {
                let id = required_str(args, "database_id")?;
                let filter = optional_json(args, "filter")?;
                let sorts = optional_json(args, "sorts")?;
                let paging = paging(args)?;
                self.notion()?.query_database(id, filter, sorts, &paging)
            }
            "notion_create_page" => {
                let id = required_str(args, "database_id")?;
                let properties = required_json(args, "properties")?;
                let children = optional_json(args, "children")?;
                self.notion()?.create_page(id, properties, children)
            }
            "notion_update_page" => {
                let id = required_str(args, "page_id")?;
                let properties = required_json(args, "properties")?;
                let archived = match args.get("archived") {
                    None | Some(Value::Null) => None,
                    Some(_) => Some(optional_bool(args, "archived")?),
                };
                self.notion()?.update_page(id, properties, archived)
            }
            "notion_get_block_children" => {
                let id = required_str(args, "block_id")?;
                let paging = paging(args)?;
                self.notion()?.get_block_children(id, &paging)
            }
            "notion_search" => {
                let query = optional_str(args, "query").unwrap_or("");
                let filter = optional_json(args, "filter")?;
                let sort = optional_json(args, "sort")?;
                let paging = paging(args)?;
                self.notion()?.search(query, filter, sort, &paging)
            }

            _ => Err(ToolError::message(format!("Unknown tool: {}", name))),
        }
    }

    /// URI templates for enabled groups
    pub fn resource_templates(&self) -> Vec<Value> {
        resources::templates(&self.config.enabled_groups)
    }

    pub fn read_resource(&mut self, uri: &str) -> Result<String, ResourceError> {
        let resource = resources::parse_uri(uri)
            .filter(|r| self.config.is_enabled(r.group()))
            .ok_or_else(|| ResourceError::UnknownUri(uri.to_string()))?;
        log::info!("READ {}", uri);
        let max = self.google_max_results();
        let client = self.google()?;
        let text = match &resource {
            Resource::GmailMessage(id) => gmail::read_message(client, id)?,
            Resource::GmailThread(id) => gmail::read_thread(client, id)?,
            Resource::CalendarEvents(cid) => calendar::read_calendar_events(client, cid, max)?,
            Resource::CalendarEvent { calendar_id, event_id } => calendar::read_event(client, calendar_id, event_id)?,
            Resource::TaskList(lid) => tasks::read_task_list(client, lid)?,
            Resource::Task { task_list_id, task_id } => tasks::read_task(client, task_list_id, task_id)?,
        };
        Ok(text)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn gateway(dir: &std::path::Path) -> Gateway {
        let mut config = MistConfig::default();
        config.notes_dir = dir.join("notes");
        config.google.credentials_path = dir.join("credentials.json");
        config.google.token_path = dir.join("token.json");
        Gateway::new(config)
    }

    #[test]
    fn every_definition_has_a_group_and_unique_name() {
        let dir = tempdir().unwrap();
        let gw = gateway(dir.path());
        let defs = gw.tool_definitions();
        assert_eq!(defs.len(), 8 + 9 + 5 + 7 + 18 + 7);
        let mut seen = HashSet::new();
        for def in &defs {
            let name = def["name"].as_str().unwrap();
            assert!(seen.insert(name.to_string()), "duplicate tool {}", name);
            assert!(tool_group(name).is_some(), "no group for {}", name);
            assert_eq!(def["inputSchema"]["type"], "object");
            for req in def["inputSchema"]["required"].as_array().unwrap() {
                let req = req.as_str().unwrap();
                assert!(def["inputSchema"]["properties"].get(req).is_some(), "{} requires undeclared {}", name, req);
            }
        }
    }

    #[test]
    fn disabled_groups_are_hidden_and_rejected() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        gw.config.enabled_groups = vec![ToolGroup::Notes];
        assert_eq!(gw.tool_definitions().len(), 8);

        let out = gw.call("git_status", &json!({"repo_path": "."}));
        assert_eq!(out, CallOutput { text: "Unknown tool: git_status".to_string(), is_error: true });
        let out = gw.call("no_such_tool", &json!({}));
        assert_eq!(out.text, "Unknown tool: no_such_tool");
        gw.config.enabled_groups = ToolGroup::ALL.to_vec();
        assert_eq!(gw.call("git_frobnicate", &json!({})).text, "Unknown tool: git_frobnicate");
        gw.config.enabled_groups = vec![ToolGroup::Notes];
        let out = gw.call("get_emails", &json!({"message_ids": []}));
        assert_eq!(out.text, "Unknown tool: get_emails");
    }

    #[test]
    fn missing_params_are_reported_before_auth() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        let cases = [
            ("add_note", json!({"content": "x"}), "title"),
            ("search_notes", json!({}), "query"),
            ("edit_note", json!({"note_id": "x"}), "new_content"),
            ("get_emails", json!({}), "message_ids"),
            ("send_email", json!({"to": "a@example.com", "subject": "s"}), "body"),
            ("create_event", json!({"calendar_id": "primary", "title": "t"}), "start_datetime"),
            ("create_task", json!({"task_list_id": "L"}), "title"),
            ("git_commit", json!({"repo_path": "."}), "message"),
            ("notion_create_page", json!({"database_id": "d"}), "properties"),
        ];
        for (tool, args, param) in cases {
            let out = gw.call(tool, &args);
            assert!(out.is_error, "{} should fail", tool);
            assert_eq!(out.text, format!("Error: Missing required parameter: {}", param), "tool {}", tool);
        }
        let out = gw.call("get_emails", &json!({"message_ids": []}));
        assert_eq!(out, CallOutput { text: "No message IDs provided.".to_string(), is_error: false });
    }

    #[test]
    fn google_tools_fail_cleanly_without_credentials() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        let out = gw.call("list_calendars", &json!({}));
        assert!(out.is_error);
        assert!(out.text.starts_with("Error: Authentication failed: Credentials file not found at"));
        // Notes keep working
        let out = gw.call("add_note", &json!({"title": "Still", "content": "works"}));
        assert!(!out.is_error, "{}", out.text);
    }

    #[test]
    fn invalid_dates_fail_before_auth() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        let out = gw.call("search_emails", &json!({"after_date": "2024-01-01"}));
        assert_eq!(out.text, "Error: after_date '2024-01-01' is not in the required format YYYY/MM/DD");
        let out = gw.call(
            "create_event",
            &json!({"calendar_id": "primary", "title": "t", "start_datetime": "2024-06-03T11:00:00Z", "end_datetime": "2024-06-03T10:00:00Z"}),
        );
        assert!(out.text.contains("end_datetime"));
        let out = gw.call("create_task", &json!({"task_list_id": "L", "title": "t", "due": "someday"}));
        assert!(out.text.starts_with("Error: Invalid parameter 'due'"));
    }

    #[test]
    fn notion_without_key_is_auth_error() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        gw.config.notion.api_key.clear();
        let out = gw.call("notion_list_databases", &json!({}));
        assert_eq!(
            out.text,
            "Error: Authentication failed: NOTION_API_KEY not found in environment variables"
        );
    }

    #[test]
    fn note_tools_end_to_end() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        let out = gw.call("add_note", &json!({"title": "Plan", "content": "Ship it. #work", "subject": "Job"}));
        assert!(out.text.starts_with("Note 'Plan' saved with ID: "));
        let id = out.text.rsplit(' ').next().unwrap().to_string();

        assert!(gw.call("read_note", &json!({"note_id": id})).text.contains("Ship it."));
        assert!(gw.call("search_notes", &json!({"query": "#work"})).text.contains("**Plan**"));
        assert!(gw.call("list_notes", &json!({"limit": "5"})).text.contains("**Plan**"));
        assert!(gw.call("organize_notes_by_subject", &json!({})).text.contains("## Job"));
        assert!(gw.call("generate_note_summary", &json!({"title": "plan"})).text.contains("Ship it"));
        assert!(!gw.call("edit_note", &json!({"note_id": id, "new_content": "Done."})).is_error);
        assert!(!gw.call("delete_note", &json!({"note_id": id})).is_error);
        let out = gw.call("read_note", &json!({"note_id": id}));
        assert_eq!(out.text, "Error: Note not found. Please check the ID or title.");
    }

    #[test]
    fn unknown_and_disabled_resources() {
        let dir = tempdir().unwrap();
        let mut gw = gateway(dir.path());
        assert!(matches!(gw.read_resource("bogus://x"), Err(ResourceError::UnknownUri(_))));
        gw.config.enabled_groups = vec![ToolGroup::Notes];
        assert!(matches!(gw.read_resource("gmail://messages/abc"), Err(ResourceError::UnknownUri(_))));
        assert!(gw.resource_templates().is_empty());
    }

    #[test]
    fn param_summary_hides_bodies() {
        let summary = param_summary(&json!({"to": "a@example.com", "body": "secret text"}));
        assert!(summary.contains("to=a@example.com"));
        assert!(!summary.contains("secret"));
    }
}
