// MIST Gateway - Resource URIs
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Read-only resources behind gmail://, calendar:// and tasks:// URIs.
// Segments may be percent-encoded (calendar ids carry '#' and '@').

use crate::config::ToolGroup;
use serde_json::{json, Value};

/// A parsed resource URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    GmailMessage(String),
    GmailThread(String),
    CalendarEvents(String),
    CalendarEvent { calendar_id: String, event_id: String },
    TaskList(String),
    Task { task_list_id: String, task_id: String },
}

impl Resource {
    pub fn group(&self) -> ToolGroup {
        match self {
            Resource::GmailMessage(_) | Resource::GmailThread(_) => ToolGroup::Mail,
            Resource::CalendarEvents(_) | Resource::CalendarEvent { .. } => ToolGroup::Calendar,
            Resource::TaskList(_) | Resource::Task { .. } => ToolGroup::Tasks,
        }
    }
}

struct Template {
    group: ToolGroup,
    uri: &'static str,
    name: &'static str,
    description: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        group: ToolGroup::Mail,
        uri: "gmail://messages/{message_id}",
        name: "Email message",
        description: "A single Gmail message with headers and body",
    },
    Template {
        group: ToolGroup::Mail,
        uri: "gmail://threads/{thread_id}",
        name: "Email thread",
        description: "Every message in a Gmail thread",
    },
    Template {
        group: ToolGroup::Calendar,
        uri: "calendar://calendars/{calendar_id}/events",
        name: "Calendar events",
        description: "Upcoming events in a calendar",
    },
    Template {
        group: ToolGroup::Calendar,
        uri: "calendar://calendars/{calendar_id}/events/{event_id}",
        name: "Calendar event",
        description: "One event with attendees",
    },
    Template {
        group: ToolGroup::Tasks,
        uri: "tasks://lists/{task_list_id}",
        name: "Task list",
        description: "All tasks in a task list",
    },
    Template {
        group: ToolGroup::Tasks,
        uri: "tasks://lists/{task_list_id}/tasks/{task_id}",
        name: "Task",
        description: "One task",
    },
];

/// resources/templates/list entries for the enabled groups
pub fn templates(enabled: &[ToolGroup]) -> Vec<Value> {
    TEMPLATES
        .iter()
        .filter(|t| enabled.contains(&t.group))
        .map(|t| {
            json!({
                "uriTemplate": t.uri,
                "name": t.name,
                "description": t.description,
                "mimeType": "text/plain",
            })
        })
        .collect()
}

pub fn parse_uri(uri: &str) -> Option<Resource> {
    let (scheme, rest) = uri.split_once("://")?;
    // Malformed escapes stay as written. Escapes that decode to invalid
    // UTF-8 make the URI unknown.
    let segments: Vec<String> = rest
        .split('/')
        .map(|s| urlencoding::decode(s).ok().map(|d| d.into_owned()))
        .collect::<Option<_>>()?;
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let seg: Vec<&str> = segments.iter().map(String::as_str).collect();
    match (scheme, seg.as_slice()) {
        ("gmail", ["messages", id]) => Some(Resource::GmailMessage(id.to_string())),
        ("gmail", ["threads", id]) => Some(Resource::GmailThread(id.to_string())),
        ("calendar", ["calendars", cid, "events"]) => Some(Resource::CalendarEvents(cid.to_string())),
        ("calendar", ["calendars", cid, "events", eid]) => Some(Resource::CalendarEvent {
            calendar_id: cid.to_string(),
            event_id: eid.to_string(),
        }),
        ("tasks", ["lists", lid]) => Some(Resource::TaskList(lid.to_string())),
        ("tasks", ["lists", lid, "tasks", tid]) => Some(Resource::Task {
            task_list_id: lid.to_string(),
            task_id: tid.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_uri_shape() {
        assert_eq!(parse_uri("gmail://messages/18f0a"), Some(Resource::GmailMessage("18f0a".into())));
        assert_eq!(parse_uri("gmail://threads/t9"), Some(Resource::GmailThread("t9".into())));
        assert_eq!(
            parse_uri("calendar://calendars/primary/events"),
            Some(Resource::CalendarEvents("primary".into()))
        );
        assert_eq!(
            parse_uri("calendar://calendars/primary/events/e1"),
            Some(Resource::CalendarEvent { calendar_id: "primary".into(), event_id: "e1".into() })
        );
        assert_eq!(parse_uri("tasks://lists/L1"), Some(Resource::TaskList("L1".into())));
        assert_eq!(
            parse_uri("tasks://lists/L1/tasks/T1"),
            Some(Resource::Task { task_list_id: "L1".into(), task_id: "T1".into() })
        );
    }

    #[test]
    fn percent_encoded_calendar_ids() {
        assert_eq!(
            parse_uri("calendar://calendars/en.usa%23holiday%40group.v.calendar.google.com/events"),
            Some(Resource::CalendarEvents("en.usa#holiday@group.v.calendar.google.com".into()))
        );
        assert_eq!(parse_uri("gmail://messages/100%"), Some(Resource::GmailMessage("100%".into())));
        assert_eq!(parse_uri("gmail://messages/a%2"), Some(Resource::GmailMessage("a%2".into())));
        assert_eq!(parse_uri("gmail://threads/%zz"), Some(Resource::GmailThread("%zz".into())));
        assert_eq!(parse_uri("gmail://messages/%ff"), None);
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert_eq!(parse_uri("gmail://messages/"), None);
        assert_eq!(parse_uri("gmail://labels/x"), None);
        assert_eq!(parse_uri("notes://x"), None);
        assert_eq!(parse_uri("no-scheme"), None);
        assert_eq!(parse_uri("tasks://lists/L1/tasks"), None);
    }

    #[test]
    fn templates_follow_enabled_groups() {
        assert_eq!(templates(&ToolGroup::ALL).len(), 6);
        let mail_only = templates(&[ToolGroup::Mail, ToolGroup::Notes]);
        assert_eq!(mail_only.len(), 2);
        assert!(mail_only.iter().all(|t| t["uriTemplate"].as_str().unwrap().starts_with("gmail://")));
        assert!(templates(&[ToolGroup::Git]).is_empty());
    }
}
