// MIST Gateway - Calendar Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Google Calendar v3: calendars, event CRUD and search.

use crate::error::{ToolError, ToolResult};
use crate::google::GoogleClient;
use crate::http::endpoint;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

const SERVICE: &str = "Calendar";
const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Fields for create_event
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub timezone: Option<String>,
}

/// Fields for update_event. None leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Event search window and text
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub query: Option<String>,
    pub max_results: u64,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
}

fn parse_rfc3339(name: &str, value: &str) -> Result<DateTime<FixedOffset>, ToolError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| {
        ToolError::invalid(
            name,
            format!("'{}' is not an RFC 3339 date-time (e.g. 2024-06-03T10:00:00-07:00)", value),
        )
    })
}

/// Both ends RFC 3339, end not before start
pub fn validate_range(start: &str, end: &str) -> Result<(), ToolError> {
    let s = parse_rfc3339("start_datetime", start)?;
    let e = parse_rfc3339("end_datetime", end)?;
    if e < s {
        return Err(ToolError::invalid("end_datetime", "end time is before the start time"));
    }
    Ok(())
}

pub fn event_body(event: &NewEvent) -> Value {
    let tz = event.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
    let mut body = json!({
        "summary": event.title,
        "start": {"dateTime": event.start, "timeZone": tz},
        "end": {"dateTime": event.end, "timeZone": tz},
    });
    if let Some(d) = &event.description {
        body["description"] = json!(d);
    }
    if let Some(l) = &event.location {
        body["location"] = json!(l);
    }
    if !event.attendees.is_empty() {
        let list: Vec<Value> = event.attendees.iter().map(|a| json!({"email": a})).collect();
        body["attendees"] = Value::Array(list);
    }
    body
}

/// Set `dateTime` on a start/end object, dropping an all-day `date`
fn set_date_time(event: &mut Value, key: &str, value: &str) {
    let slot = &mut event[key];
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Some(obj) = slot.as_object_mut() {
        obj.remove("date");
        obj.insert("dateTime".to_string(), json!(value));
    }
}

/// Apply a patch to a fetched event
pub fn apply_patch(event: &mut Value, patch: &EventPatch) -> Result<(), ToolError> {
    if let Some(start) = &patch.start {
        parse_rfc3339("start_datetime", start)?;
        set_date_time(event, "start", start);
    }
    if let Some(end) = &patch.end {
        parse_rfc3339("end_datetime", end)?;
        set_date_time(event, "end", end);
    }
    if let (Some(start), Some(end)) = (event["start"]["dateTime"].as_str(), event["end"]["dateTime"].as_str()) {
        validate_range(start, end)?;
    }
    if let Some(t) = &patch.title {
        event["summary"] = json!(t);
    }
    if let Some(d) = &patch.description {
        event["description"] = json!(d);
    }
    if let Some(l) = &patch.location {
        event["location"] = json!(l);
    }
    Ok(())
}

/// Start/End lines, timed or all-day
fn time_lines(event: &Value, all_day_suffix: &str) -> String {
    let mut out = String::new();
    for (key, label) in [("start", "Start"), ("end", "End")] {
        if let Some(dt) = event[key]["dateTime"].as_str() {
            out.push_str(&format!("{}: {}\n", label, dt));
        } else if let Some(d) = event[key]["date"].as_str() {
            out.push_str(&format!("{} Date: {}{}\n", label, d, all_day_suffix));
        }
    }
    out
}

pub fn format_event_summary(event: &Value) -> String {
    let mut out = format!("\nTitle: {}\n", event["summary"].as_str().unwrap_or("Untitled"));
    out.push_str(&time_lines(event, ""));
    if let Some(loc) = event["location"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Location: {}\n", loc));
    }
    out.push_str(&format!("Event ID: {}\n", event["id"].as_str().unwrap_or("Unknown")));
    out
}

pub fn format_event_detail(event_id: &str, event: &Value) -> String {
    let mut out = format!(
        "Event (ID: {})\nTitle: {}\n",
        event_id,
        event["summary"].as_str().unwrap_or("Untitled")
    );
    out.push_str(&time_lines(event, " (All day)"));
    if let Some(loc) = event["location"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Location: {}\n", loc));
    }
    if let Some(desc) = event["description"].as_str().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Description: {}\n", desc));
    }
    let attendees = event["attendees"].as_array().map(Vec::as_slice).unwrap_or_default();
    if !attendees.is_empty() {
        out.push_str("\nAttendees:\n");
        for a in attendees {
            out.push_str(&format!(
                "- {} ({})\n",
                a["email"].as_str().unwrap_or("No email"),
                a["responseStatus"].as_str().unwrap_or("Unknown")
            ));
        }
    }
    out
}

pub fn format_calendars(listing: &Value) -> String {
    let items = listing["items"].as_array().map(Vec::as_slice).unwrap_or_default();
    if items.is_empty() {
        return "No calendars found.".to_string();
    }
    let mut out = format!("Found {} calendars:\n", items.len());
    for cal in items {
        out.push_str(&format!(
            "\nTitle: {}\nID: {}\nAccess Role: {}\n",
            cal["summary"].as_str().unwrap_or("Untitled"),
            cal["id"].as_str().unwrap_or("Unknown"),
            cal["accessRole"].as_str().unwrap_or("Unknown")
        ));
        if cal["primary"].as_bool().unwrap_or(false) {
            out.push_str("Primary Calendar: Yes\n");
        }
    }
    out
}

fn events_params(q: &EventQuery) -> Vec<(&'static str, String)> {
    let time_min = q
        .time_min
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    let mut params = vec![
        ("maxResults", q.max_results.to_string()),
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
        ("timeMin", time_min),
    ];
    if let Some(max) = &q.time_max {
        params.push(("timeMax", max.clone()));
    }
    if let Some(text) = &q.query {
        params.push(("q", text.clone()));
    }
    params
}

fn list_events(client: &mut GoogleClient, calendar_id: &str, q: &EventQuery) -> Result<Vec<Value>, ToolError> {
    let url = endpoint(CALENDAR_BASE, &["calendars", calendar_id, "events"])?;
    let listing = client.get(SERVICE, url, &events_params(q))?;
    Ok(listing["items"].as_array().cloned().unwrap_or_default())
}

// ====== list_calendars ======

pub fn list_calendars(client: &mut GoogleClient) -> ToolResult {
    let url = endpoint(CALENDAR_BASE, &["users", "me", "calendarList"])?;
    Ok(format_calendars(&client.get(SERVICE, url, &[])?))
}

// ====== create_event ======

pub fn create_event(client: &mut GoogleClient, calendar_id: &str, event: &NewEvent) -> ToolResult {
    validate_range(&event.start, &event.end)?;
    let url = endpoint(CALENDAR_BASE, &["calendars", calendar_id, "events"])?;
    let created = client.post(SERVICE, url, &[("sendUpdates", "all".to_string())], &event_body(event))?;
    log::info!("Event created in {}: {}", calendar_id, created["id"].as_str().unwrap_or("?"));

    let mut out = format!(
        "Event created successfully:\nID: {}\nTitle: {}\nStart: {}\nEnd: {}\n",
        created["id"].as_str().unwrap_or("Unknown"),
        event.title,
        event.start,
        event.end
    );
    if let Some(d) = &event.description {
        out.push_str(&format!("Description: {}\n", d));
    }
    if let Some(l) = &event.location {
        out.push_str(&format!("Location: {}\n", l));
    }
    if !event.attendees.is_empty() {
        out.push_str(&format!("Attendees: {}\n", event.attendees.join(", ")));
    }
    if let Some(tz) = &event.timezone {
        out.push_str(&format!("Timezone: {}\n", tz));
    }
    if let Some(link) = created["htmlLink"].as_str() {
        out.push_str(&format!("\nEvent Link: {}\n", link));
    }
    Ok(out)
}

// ====== update_event ======

pub fn update_event(client: &mut GoogleClient, calendar_id: &str, event_id: &str, patch: &EventPatch) -> ToolResult {
    let url = endpoint(CALENDAR_BASE, &["calendars", calendar_id, "events", event_id])?;
    let mut event = client.get(SERVICE, url.clone(), &[])?;
    apply_patch(&mut event, patch)?;
    let updated = client.put(SERVICE, url, &[], &event)?;
    log::info!("Event updated in {}: {}", calendar_id, event_id);

    let mut out = format!("Event updated successfully:\nID: {}\n", event_id);
    let changes = [
        ("New Title", &patch.title),
        ("New Start Time", &patch.start),
        ("New End Time", &patch.end),
        ("New Description", &patch.description),
        ("New Location", &patch.location),
    ];
    for (label, value) in changes {
        if let Some(v) = value {
            out.push_str(&format!("{}: {}\n", label, v));
        }
    }
    if let Some(link) = updated["htmlLink"].as_str() {
        out.push_str(&format!("\nEvent Link: {}\n", link));
    }
    Ok(out)
}

// ====== delete_event ======

pub fn delete_event(client: &mut GoogleClient, calendar_id: &str, event_id: &str) -> ToolResult {
    let url = endpoint(CALENDAR_BASE, &["calendars", calendar_id, "events", event_id])?;
    client.delete(SERVICE, url, &[])?;
    log::info!("Event deleted from {}: {}", calendar_id, event_id);
    Ok(format!(
        "Event (ID: {}) has been deleted successfully from calendar {}.",
        event_id, calendar_id
    ))
}

// ====== search_events ======

pub fn search_events(client: &mut GoogleClient, calendar_id: &str, q: &EventQuery) -> ToolResult {
    let events = list_events(client, calendar_id, q)?;
    let mut out = format!(
        "Search results for '{}' in calendar {}:\n",
        q.query.as_deref().unwrap_or(""),
        calendar_id
    );
    if events.is_empty() {
        out.push_str("\nNo matching events found.");
        return Ok(out);
    }
    for event in &events {
        out.push_str(&format_event_summary(event));
    }
    Ok(out)
}

// ====== resources ======

pub fn read_calendar_events(client: &mut GoogleClient, calendar_id: &str, max_results: u64) -> ToolResult {
    let q = EventQuery {
        max_results,
        ..Default::default()
    };
    let events = list_events(client, calendar_id, &q)?;
    let mut out = format!("Calendar (ID: {})\n", calendar_id);
    if events.is_empty() {
        out.push_str("\nNo events found in this calendar.");
        return Ok(out);
    }
    for event in &events {
        out.push_str(&format_event_summary(event));
    }
    Ok(out)
}

pub fn read_event(client: &mut GoogleClient, calendar_id: &str, event_id: &str) -> ToolResult {
    let url = endpoint(CALENDAR_BASE, &["calendars", calendar_id, "events", event_id])?;
    Ok(format_event_detail(event_id, &client.get(SERVICE, url, &[])?))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validation() {
        assert!(validate_range("2024-06-03T10:00:00-07:00", "2024-06-03T11:00:00-07:00").is_ok());
        assert!(validate_range("2024-06-03T10:00:00Z", "2024-06-03T10:00:00Z").is_ok());
        // 17:30Z is 10:30 -07:00, after the start
        assert!(validate_range("2024-06-03T10:00:00-07:00", "2024-06-03T17:30:00Z").is_ok());
        assert!(matches!(
            validate_range("2024-06-03T11:00:00Z", "2024-06-03T10:00:00Z"),
            Err(ToolError::InvalidParam { name, .. }) if name == "end_datetime"
        ));
        assert!(matches!(
            validate_range("tomorrow", "2024-06-03T10:00:00Z"),
            Err(ToolError::InvalidParam { name, .. }) if name == "start_datetime"
        ));
    }

    #[test]
    fn event_body_defaults_to_utc() {
        let body = event_body(&NewEvent {
            title: "Standup".to_string(),
            start: "2024-06-03T10:00:00Z".to_string(),
            end: "2024-06-03T10:15:00Z".to_string(),
            attendees: vec!["a@example.com".to_string()],
            ..Default::default()
        });
        assert_eq!(body["start"]["timeZone"], "UTC");
        assert_eq!(body["end"]["dateTime"], "2024-06-03T10:15:00Z");
        assert_eq!(body["attendees"][0]["email"], "a@example.com");
        assert!(body.get("location").is_none());
    }

    #[test]
    fn patch_replaces_all_day_dates() {
        let mut event = json!({
            "summary": "Offsite",
            "start": {"date": "2024-06-03"},
            "end": {"date": "2024-06-04"}
        });
        let patch = EventPatch {
            start: Some("2024-06-03T09:00:00Z".to_string()),
            end: Some("2024-06-03T17:00:00Z".to_string()),
            location: Some("HQ".to_string()),
            ..Default::default()
        };
        apply_patch(&mut event, &patch).unwrap();
        assert!(event["start"].get("date").is_none());
        assert_eq!(event["start"]["dateTime"], "2024-06-03T09:00:00Z");
        assert_eq!(event["location"], "HQ");
        assert_eq!(event["summary"], "Offsite");
    }

    #[test]
    fn patch_rejects_inverted_range() {
        let mut event = json!({
            "start": {"dateTime": "2024-06-03T09:00:00Z"},
            "end": {"dateTime": "2024-06-03T10:00:00Z"}
        });
        let patch = EventPatch {
            start: Some("2024-06-03T12:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(apply_patch(&mut event, &patch).is_err());
    }

    #[test]
    fn calendars_listing_marks_primary() {
        let listing = json!({"items": [
            {"summary": "Me", "id": "me@example.com", "accessRole": "owner", "primary": true},
            {"summary": "Holidays", "id": "en.usa#holiday@group.v.calendar.google.com", "accessRole": "reader"}
        ]});
        let text = format_calendars(&listing);
        assert!(text.starts_with("Found 2 calendars:\n"));
        assert_eq!(text.matches("Primary Calendar: Yes").count(), 1);
        assert_eq!(format_calendars(&json!({})), "No calendars found.");
    }

    #[test]
    fn event_detail_lists_attendees() {
        let event = json!({
            "summary": "Review",
            "start": {"date": "2024-06-03"},
            "end": {"date": "2024-06-04"},
            "attendees": [{"email": "b@example.com", "responseStatus": "accepted"}]
        });
        let text = format_event_detail("e1", &event);
        assert!(text.contains("Start Date: 2024-06-03 (All day)\n"));
        assert!(text.contains("- b@example.com (accepted)\n"));
    }

    #[test]
    fn search_params_default_time_min() {
        let params = events_params(&EventQuery {
            query: Some("standup".to_string()),
            max_results: 5,
            ..Default::default()
        });
        assert!(params.iter().any(|(k, v)| *k == "singleEvents" && v == "true"));
        assert!(params.iter().any(|(k, v)| *k == "q" && v == "standup"));
        let time_min = params.iter().find(|(k, _)| *k == "timeMin").map(|(_, v)| v.clone()).unwrap();
        assert!(DateTime::parse_from_rfc3339(&time_min).is_ok());
    }
}
