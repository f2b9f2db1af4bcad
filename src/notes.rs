// MIST Gateway - Note Store
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Flat-file notes: one markdown file per note plus two JSON side-car indexes
//   index.json  [NoteMeta]          id -> metadata
//   tags.json   {tag: [note ids]}   tag -> ids
// Index writes go through tmp file + rename. The two indexes are updated one
// after the other and can disagree after a crash. No repair pass.

use crate::error::{ToolError, ToolResult};
use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const INDEX_FILE: &str = "index.json";
const TAGS_FILE: &str = "tags.json";
const MAX_KEY_POINTS: usize = 5;

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static UNSAFE_TITLE_RE: OnceLock<Regex> = OnceLock::new();
static TITLE_RE: OnceLock<Regex> = OnceLock::new();
static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static PARAGRAPH_RE: OnceLock<Regex> = OnceLock::new();
static SENTENCE_RE: OnceLock<Regex> = OnceLock::new();

/// Index entry for one note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMeta {
    pub id: String,
    pub title: String,
    pub created: i64,
    pub modified: i64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub filename: String,
}

pub type TagsIndex = BTreeMap<String, Vec<String>>;

/// Hashtags (`#word`) in content, deduplicated, in first-seen order
pub fn extract_tags(content: &str) -> Vec<String> {
    let re = TAG_RE.get_or_init(|| Regex::new(r"#(\w+)").expect("valid tag regex"));
    let mut tags: Vec<String> = Vec::new();
    for cap in re.captures_iter(content) {
        let tag = cap[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Filename-safe form of a title: word chars, spaces and '-' only,
/// spaces turned into '-', lowercased
pub fn safe_title(title: &str) -> String {
    let re = UNSAFE_TITLE_RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid title regex"));
    re.replace_all(title, "").trim().replace(' ', "-").to_lowercase()
}

/// Note file body: header block followed by the content
fn render_note(title: &str, date_str: &str, subject: Option<&str>, tags: &[String], content: &str) -> String {
    let mut out = format!("# {}\n\nDate: {}\n", title, date_str);
    if let Some(subject) = subject.filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!("Subject: {}\n", subject));
    }
    if !tags.is_empty() {
        out.push_str(&format!("Tags: {}\n", format_tags(tags)));
    }
    out.push_str(&format!("\n{}\n", content));
    out
}

fn format_tags(tags: &[String]) -> String {
    tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(", ")
}

/// YYYY-MM-DD in local time, "Unknown" for an unrepresentable timestamp
fn format_date(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Numbered listing shared by list and search output
fn format_entries(notes: &[&NoteMeta]) -> String {
    let mut out = String::new();
    for (i, note) in notes.iter().enumerate() {
        out.push_str(&format!("{}. **{}** ({})\n", i + 1, note.title, format_date(note.created)));
        out.push_str(&format!("   ID: {}\n", note.id));
        if let Some(subject) = note.subject.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("   Subject: {}\n", subject));
        }
        if !note.tags.is_empty() {
            out.push_str(&format!("   Tags: {}\n", format_tags(&note.tags)));
        }
        out.push('\n');
    }
    out
}

/// Ids filed under a tag, compared case-insensitively
fn ids_for_tag(tags: &TagsIndex, tag: &str) -> Vec<String> {
    let wanted = tag.to_lowercase();
    let mut ids = Vec::new();
    for (name, list) in tags {
        if name.to_lowercase() == wanted {
            for id in list {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
    }
    ids
}

/// Key-point summary of a rendered note
pub fn summarize(note_content: &str) -> String {
    let title_re = TITLE_RE.get_or_init(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));
    let heading_re = HEADING_RE.get_or_init(|| Regex::new(r"(?m)^## (.+)$").expect("valid regex"));
    let para_re = PARAGRAPH_RE.get_or_init(|| Regex::new(r"\n\n+").expect("valid regex"));
    let sentence_re = SENTENCE_RE.get_or_init(|| Regex::new(r"^([^.!?]+[.!?])").expect("valid regex"));

    let title = title_re
        .captures(note_content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "Unknown Title".to_string());

    let headings: Vec<String> = heading_re
        .captures_iter(note_content)
        .map(|c| c[1].trim().to_string())
        .collect();

    let mut first_sentences = Vec::new();
    for para in para_re.split(note_content) {
        if para.starts_with('#') || para.trim().is_empty() {
            continue;
        }
        let flat = para.replace('\n', " ");
        if let Some(cap) = sentence_re.captures(&flat) {
            first_sentences.push(cap[1].trim().to_string());
        }
    }

    let mut summary = format!("# Summary of: {}\n\n", title);
    if !headings.is_empty() {
        summary.push_str("## Key Topics\n");
        for heading in &headings {
            summary.push_str(&format!("- {}\n", heading));
        }
        summary.push('\n');
    }
    if !first_sentences.is_empty() {
        summary.push_str("## Key Points\n");
        for sentence in first_sentences.iter().take(MAX_KEY_POINTS) {
            summary.push_str(&format!("- {}\n", sentence));
        }
    }
    summary
}

/// Directory-backed note store
pub struct NoteStore {
    dir: PathBuf,
}

impl NoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn tags_path(&self) -> PathBuf {
        self.dir.join(TAGS_FILE)
    }

    /// Create the notes dir and empty indexes if missing
    fn ensure_dir(&self) -> Result<(), ToolError> {
        std::fs::create_dir_all(&self.dir)?;
        if !self.index_path().exists() {
            write_atomic(&self.index_path(), "[]")?;
        }
        if !self.tags_path().exists() {
            write_atomic(&self.tags_path(), "{}")?;
        }
        Ok(())
    }

    /// Load index.json. A corrupt file is moved aside and treated as empty.
    pub fn load_index(&self) -> Result<Vec<NoteMeta>, ToolError> {
        load_json_or_default(&self.index_path())
    }

    fn save_index(&self, index: &[NoteMeta]) -> Result<(), ToolError> {
        write_atomic(&self.index_path(), &serde_json::to_string_pretty(index)?)
    }

    pub fn load_tags(&self) -> Result<TagsIndex, ToolError> {
        load_json_or_default(&self.tags_path())
    }

    fn save_tags(&self, tags: &TagsIndex) -> Result<(), ToolError> {
        write_atomic(&self.tags_path(), &serde_json::to_string_pretty(tags)?)
    }

    /// Re-file a note under exactly `tags`, dropping tags left empty
    fn update_tags(&self, note_id: &str, tags: &[String]) -> Result<(), ToolError> {
        let mut index = self.load_tags()?;
        for ids in index.values_mut() {
            ids.retain(|id| id != note_id);
        }
        for tag in tags {
            let ids = index.entry(tag.clone()).or_default();
            if !ids.iter().any(|id| id == note_id) {
                ids.push(note_id.to_string());
            }
        }
        index.retain(|_, ids| !ids.is_empty());
        self.save_tags(&index)
    }

    /// First free id for a title at a given instant
    fn unique_id(&self, index: &[NoteMeta], title: &str, now: &DateTime<Local>) -> String {
        let base = format!("{}-{}-{}", now.format("%Y-%m-%d"), safe_title(title), now.timestamp());
        let taken = |id: &str| {
            index.iter().any(|n| n.id == id) || self.dir.join(format!("{}.md", id)).exists()
        };
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // ====== add_note ======

    pub fn add_note(&self, title: &str, content: &str, subject: Option<&str>) -> ToolResult {
        let meta = self.add_note_at(title, content, subject, Local::now())?;
        Ok(format!("Note '{}' saved with ID: {}", meta.title, meta.id))
    }

    pub fn add_note_at(
        &self,
        title: &str,
        content: &str,
        subject: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<NoteMeta, ToolError> {
        self.ensure_dir()?;
        let mut index = self.load_index()?;

        let id = self.unique_id(&index, title, &now);
        let filename = format!("{}.md", id);
        let tags = extract_tags(content);
        let subject = subject.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let timestamp = now.timestamp();

        let body = render_note(title, &now.format("%Y-%m-%d").to_string(), subject.as_deref(), &tags, content);
        std::fs::write(self.dir.join(&filename), body)?;

        let meta = NoteMeta {
            id: id.clone(),
            title: title.to_string(),
            created: timestamp,
            modified: timestamp,
            subject,
            tags: tags.clone(),
            filename,
        };
        index.push(meta.clone());
        self.save_index(&index)?;
        self.update_tags(&id, &tags)?;

        log::info!("Note created: {}", id);
        Ok(meta)
    }

    /// Resolve a note by id, or by case-insensitive title
    fn find(&self, index: &[NoteMeta], note_id: Option<&str>, title: Option<&str>) -> Result<NoteMeta, ToolError> {
        let found = match (note_id, title) {
            (Some(id), _) => index.iter().find(|n| n.id == id),
            (None, Some(title)) => {
                let wanted = title.to_lowercase();
                index.iter().find(|n| n.title.to_lowercase() == wanted)
            }
            (None, None) => return Err(ToolError::missing("note_id or title")),
        };
        found
            .cloned()
            .ok_or_else(|| ToolError::not_found("Note not found. Please check the ID or title."))
    }

    // ====== read_note ======

    pub fn read_note(&self, note_id: Option<&str>, title: Option<&str>) -> ToolResult {
        self.ensure_dir()?;
        let index = self.load_index()?;
        let meta = self.find(&index, note_id, title)?;
        let path = self.dir.join(&meta.filename);
        if !path.exists() {
            return Err(ToolError::not_found(format!("Note file not found: {}", path.display())));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    // ====== list_notes ======

    pub fn list_notes(&self, subject: Option<&str>, tag: Option<&str>, limit: usize) -> ToolResult {
        self.ensure_dir()?;
        let index = self.load_index()?;
        let mut notes: Vec<&NoteMeta> = index.iter().collect();

        if let Some(subject) = subject {
            notes.retain(|n| n.subject.as_deref() == Some(subject));
        }
        if let Some(tag) = tag {
            let ids = ids_for_tag(&self.load_tags()?, tag.trim_start_matches('#'));
            notes.retain(|n| ids.contains(&n.id));
        }

        notes.sort_by(|a, b| b.created.cmp(&a.created));
        notes.truncate(limit);

        if notes.is_empty() {
            return Ok("No notes found matching the criteria.".to_string());
        }
        Ok(format!("# Notes List\n\n{}", format_entries(&notes)))
    }

    // ====== generate_note_summary ======

    pub fn generate_summary(&self, note_id: Option<&str>, title: Option<&str>) -> ToolResult {
        let content = self.read_note(note_id, title)?;
        Ok(summarize(&content))
    }

    // ====== search_notes ======

    /// `#tag` queries go to the tag index; anything else matches titles
    /// first, then file contents
    pub fn search_notes(&self, query: &str) -> ToolResult {
        self.ensure_dir()?;
        let index = self.load_index()?;
        let query = query.trim().to_lowercase();
        let mut results: Vec<&NoteMeta> = Vec::new();

        if let Some(tag) = query.strip_prefix('#') {
            let ids = ids_for_tag(&self.load_tags()?, tag);
            results.extend(index.iter().filter(|n| ids.contains(&n.id)));
        } else {
            results.extend(index.iter().filter(|n| n.title.to_lowercase().contains(&query)));
            for note in &index {
                if results.iter().any(|r| r.id == note.id) {
                    continue;
                }
                match std::fs::read_to_string(self.dir.join(&note.filename)) {
                    Ok(content) if content.to_lowercase().contains(&query) => results.push(note),
                    Ok(_) => {}
                    Err(e) => log::debug!("Skipping unreadable note {}: {}", note.filename, e),
                }
            }
        }

        if results.is_empty() {
            return Ok(format!("No notes found matching '{}'.", query));
        }
        Ok(format!("# Search Results for: {}\n\n{}", query, format_entries(&results)))
    }

    // ====== edit_note ======

    pub fn edit_note(&self, note_id: &str, new_content: &str) -> ToolResult {
        self.ensure_dir()?;
        let mut index = self.load_index()?;
        let pos = index
            .iter()
            .position(|n| n.id == note_id)
            .ok_or_else(|| ToolError::not_found(format!("Note not found with ID: {}", note_id)))?;

        let path = self.dir.join(&index[pos].filename);
        if !path.exists() {
            return Err(ToolError::not_found(format!("Note file not found: {}", path.display())));
        }

        let tags = extract_tags(new_content);
        let meta = &mut index[pos];
        meta.modified = Local::now().timestamp();
        meta.tags = tags.clone();

        let body = render_note(&meta.title, &format_date(meta.created), meta.subject.as_deref(), &tags, new_content);
        std::fs::write(&path, body)?;
        let title = meta.title.clone();

        self.save_index(&index)?;
        self.update_tags(note_id, &tags)?;

        log::info!("Note edited: {}", note_id);
        Ok(format!("Note '{}' updated successfully.", title))
    }

    // ====== delete_note ======

    pub fn delete_note(&self, note_id: &str) -> ToolResult {
        self.ensure_dir()?;
        let mut index = self.load_index()?;
        let pos = index
            .iter()
            .position(|n| n.id == note_id)
            .ok_or_else(|| ToolError::not_found(format!("Note not found with ID: {}", note_id)))?;
        let meta = index.remove(pos);

        let path = self.dir.join(&meta.filename);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.save_index(&index)?;
        self.update_tags(note_id, &[])?;

        log::info!("Note deleted: {}", note_id);
        Ok(format!("Note '{}' deleted successfully.", meta.title))
    }

    // ====== organize_notes_by_subject ======

    pub fn organize_by_subject(&self) -> ToolResult {
        self.ensure_dir()?;
        let index = self.load_index()?;

        let mut subjects: BTreeMap<String, Vec<&NoteMeta>> = BTreeMap::new();
        for note in &index {
            let subject = note
                .subject
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("Uncategorized");
            subjects.entry(subject.to_string()).or_default().push(note);
        }

        let mut out = String::from("# Notes Organized by Subject\n\n");
        for (subject, notes) in subjects.iter_mut() {
            notes.sort_by(|a, b| b.created.cmp(&a.created));
            out.push_str(&format!("## {}\n\n", subject));
            for note in notes.iter() {
                out.push_str(&format!(
                    "- **{}** ({}) - ID: {}\n",
                    note.title,
                    format_date(note.created),
                    note.id
                ));
            }
            out.push('\n');
        }
        Ok(out)
    }
}

/// Parse a JSON index file. Missing or empty yields the default.
/// Content that is not valid JSON (including invalid UTF-8) is renamed to
/// `{file}.corrupt` and the default returned. Any other read failure is an
/// error, so callers never overwrite a file they could not read.
fn load_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, ToolError> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            log::warn!("Index {:?} is unreadable: {}", path, e);
            return Err(e.into());
        }
    };
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    match serde_json::from_slice(&content) {
        Ok(v) => Ok(v),
        Err(e) => {
            let aside = path.with_extension("json.corrupt");
            log::warn!("Index {:?} is corrupt ({}), moving it to {:?}", path, e, aside);
            std::fs::rename(path, &aside)?;
            Ok(T::default())
        }
    }
}

/// Write via `{file}.tmp` + rename
fn write_atomic(path: &Path, content: &str) -> Result<(), ToolError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn at(ts: i64) -> DateTime<Local> {
        Local.timestamp_opt(ts, 0).single().unwrap()
    }

    #[test]
    fn tags_are_deduplicated_in_order() {
        assert_eq!(extract_tags("#rust and #mcp, again #rust"), vec!["rust", "mcp"]);
        assert!(extract_tags("# Heading only").is_empty());
        assert_eq!(extract_tags("ends with #tag_1."), vec!["tag_1"]);
    }

    #[test]
    fn safe_title_strips_punctuation() {
        assert_eq!(safe_title("Hello, World!"), "hello-world");
        assert_eq!(safe_title("  Meeting: Q3 / plan  "), "meeting-q3--plan");
        assert_eq!(safe_title("already-safe"), "already-safe");
    }

    #[test]
    fn add_creates_file_and_indexes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        let meta = store.add_note_at("Groceries", "Buy milk #shopping #home", Some("Errands"), at(1_700_000_000))?;

        assert!(meta.id.ends_with("-groceries-1700000000"));
        assert_eq!(meta.tags, vec!["shopping", "home"]);
        let file = std::fs::read_to_string(dir.path().join(&meta.filename))?;
        assert!(file.starts_with("# Groceries\n\nDate: "));
        assert!(file.contains("Subject: Errands\n"));
        assert!(file.contains("Tags: #shopping, #home\n"));
        assert!(file.ends_with("\nBuy milk #shopping #home\n"));

        assert_eq!(store.load_index().unwrap(), vec![meta.clone()]);
        let tags = store.load_tags().unwrap();
        assert_eq!(tags["shopping"], vec![meta.id.clone()]);
        assert_eq!(tags["home"], vec![meta.id]);
        Ok(())
    }

    #[test]
    fn same_title_same_second_gets_unique_ids() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        let a = store.add_note_at("Daily", "one", None, at(1_700_000_000))?;
        let b = store.add_note_at("Daily", "two", None, at(1_700_000_000))?;
        assert_ne!(a.id, b.id);
        assert!(b.id.ends_with("-2"));
        assert!(store.read_note(Some(&a.id), None)?.contains("one"));
        assert!(store.read_note(Some(&b.id), None)?.contains("two"));
        Ok(())
    }

    #[test]
    fn read_by_title_is_case_insensitive() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note("Project Plan", "Ship it.", None)?;
        assert!(store.read_note(None, Some("project plan"))?.contains("Ship it."));
        Ok(())
    }

    #[test]
    fn missing_note_is_not_found() {
        let dir = tempdir().unwrap();
        let store = NoteStore::new(dir.path());
        let err = store.read_note(Some("nope"), None).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        assert_eq!(err.to_tool_text(), "Error: Note not found. Please check the ID or title.");
        assert!(matches!(store.edit_note("nope", "x"), Err(ToolError::NotFound(_))));
        assert!(matches!(store.delete_note("nope"), Err(ToolError::NotFound(_))));
        assert!(matches!(store.read_note(None, None), Err(ToolError::MissingParam(_))));
    }

    #[test]
    fn indexed_note_without_file_reports_path() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        let meta = store.add_note_at("Gone", "x", None, at(1_700_000_000))?;
        std::fs::remove_file(dir.path().join(&meta.filename))?;
        let err = store.read_note(Some(&meta.id), None).unwrap_err();
        assert!(err.to_string().starts_with("Note file not found: "));
        Ok(())
    }

    #[test]
    fn search_routes_hash_queries_to_tags() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note_at("Tagged", "about #Rust", None, at(1_700_000_000))?;
        // Mentions "rust" in the body but carries no tag
        store.add_note_at("Untagged", "rust is mentioned here", None, at(1_700_000_100))?;

        let by_tag = store.search_notes("#rust")?;
        assert!(by_tag.contains("**Tagged**"));
        assert!(!by_tag.contains("**Untagged**"));

        let by_text = store.search_notes("rust")?;
        assert!(by_text.contains("**Tagged**"));
        assert!(by_text.contains("**Untagged**"));
        Ok(())
    }

    #[test]
    fn search_lists_title_matches_first() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note_at("Other", "a note about budget", None, at(1_700_000_000))?;
        store.add_note_at("Budget", "numbers", None, at(1_700_000_100))?;
        let out = store.search_notes("BUDGET")?;
        assert!(out.starts_with("# Search Results for: budget"));
        let budget = out.find("**Budget**").unwrap();
        let other = out.find("**Other**").unwrap();
        assert!(budget < other);
        assert_eq!(store.search_notes("absent")?, "No notes found matching 'absent'.");
        Ok(())
    }

    #[test]
    fn list_filters_sorts_and_limits() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note_at("Old", "#work", Some("Job"), at(1_700_000_000))?;
        store.add_note_at("New", "#work", Some("Job"), at(1_700_100_000))?;
        store.add_note_at("Home", "#family", Some("Life"), at(1_700_200_000))?;

        let all = store.list_notes(None, None, 10)?;
        assert!(all.find("**Home**").unwrap() < all.find("**New**").unwrap());
        assert!(all.find("**New**").unwrap() < all.find("**Old**").unwrap());

        let job = store.list_notes(Some("Job"), None, 10)?;
        assert!(!job.contains("**Home**"));

        let limited = store.list_notes(None, Some("work"), 1)?;
        assert!(limited.contains("**New**"));
        assert!(!limited.contains("**Old**"));

        assert_eq!(store.list_notes(Some("None"), None, 10)?, "No notes found matching the criteria.");
        Ok(())
    }

    #[test]
    fn edit_rewrites_body_and_retags() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        let meta = store.add_note_at("Trip", "Pack #travel", Some("Plans"), at(1_700_000_000))?;

        let msg = store.edit_note(&meta.id, "Booked #flights")?;
        assert_eq!(msg, "Note 'Trip' updated successfully.");

        let file = store.read_note(Some(&meta.id), None)?;
        assert!(file.starts_with("# Trip\n"));
        assert!(file.contains("Subject: Plans\n"));
        assert!(file.contains("Booked #flights"));
        assert!(!file.contains("Pack"));

        let tags = store.load_tags().unwrap();
        assert!(!tags.contains_key("travel"));
        assert_eq!(tags["flights"], vec![meta.id.clone()]);
        let index = store.load_index().unwrap();
        assert_eq!(index[0].tags, vec!["flights"]);
        assert_eq!(index[0].created, 1_700_000_000);
        Ok(())
    }

    #[test]
    fn delete_cleans_file_and_both_indexes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        let keep = store.add_note_at("Keep", "#shared", None, at(1_700_000_000))?;
        let drop = store.add_note_at("Drop", "#shared #solo", None, at(1_700_000_100))?;

        assert_eq!(store.delete_note(&drop.id)?, "Note 'Drop' deleted successfully.");
        assert!(!dir.path().join(&drop.filename).exists());
        assert_eq!(store.load_index().unwrap(), vec![keep.clone()]);
        let tags = store.load_tags().unwrap();
        assert_eq!(tags["shared"], vec![keep.id]);
        assert!(!tags.contains_key("solo"));
        Ok(())
    }

    #[test]
    fn organize_groups_by_subject() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note_at("B note", "x", Some("Beta"), at(1_700_000_000))?;
        store.add_note_at("A note", "x", Some("Alpha"), at(1_700_000_000))?;
        store.add_note_at("Loose", "x", None, at(1_700_000_000))?;

        let out = store.organize_by_subject()?;
        let alpha = out.find("## Alpha").unwrap();
        let beta = out.find("## Beta").unwrap();
        let uncategorized = out.find("## Uncategorized").unwrap();
        assert!(alpha < beta && beta < uncategorized);
        assert!(out.contains("- **Loose** ("));
        Ok(())
    }

    #[test]
    fn summary_collects_topics_and_points() {
        let note = "# Launch\n\nDate: 2024-01-01\n\nWe ship Friday. Then rest.\n\n## Risks\n\nThe build may fail! Keep calm.\n";
        let summary = summarize(note);
        assert!(summary.starts_with("# Summary of: Launch\n\n"));
        assert!(summary.contains("## Key Topics\n- Risks\n"));
        assert!(summary.contains("- We ship Friday.\n"));
        assert!(summary.contains("- The build may fail!\n"));
        assert!(!summary.contains("Then rest"));
    }

    #[test]
    fn corrupt_index_is_moved_aside() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        std::fs::write(dir.path().join(INDEX_FILE), "{not json")?;
        assert!(store.load_index().unwrap().is_empty());
        assert!(dir.path().join("index.json.corrupt").exists());
        Ok(())
    }

    #[test]
    fn non_utf8_index_is_kept_aside_before_next_write() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        store.add_note_at("First", "one", None, at(1_700_000_000))?;

        let index_path = dir.path().join(INDEX_FILE);
        let mut bytes = std::fs::read(&index_path)?;
        bytes.insert(1, 0xff);
        std::fs::write(&index_path, &bytes)?;

        store.add_note_at("Second", "two", None, at(1_700_000_100))?;
        let aside = std::fs::read(dir.path().join("index.json.corrupt"))?;
        assert_eq!(aside, bytes);
        assert!(String::from_utf8_lossy(&aside).contains("First"));
        let titles: Vec<String> = store.load_index()?.into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Second"]);
        Ok(())
    }

    #[test]
    fn unreadable_index_blocks_writes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = NoteStore::new(dir.path());
        // A directory where index.json should be cannot be read as a file
        std::fs::create_dir(dir.path().join(INDEX_FILE))?;
        assert!(matches!(store.load_index(), Err(ToolError::Io(_))));
        assert!(store.add_note("Blocked", "text", None).is_err());
        assert!(dir.path().join(INDEX_FILE).is_dir());
        assert!(!dir.path().join("index.json.corrupt").exists());
        Ok(())
    }
}
