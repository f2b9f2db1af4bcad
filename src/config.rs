// MIST Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Layers: compiled defaults -> optional JSON file -> environment (.env first).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Master configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MistConfig {
    pub notes_dir: PathBuf,
    pub google: GoogleConfig,
    pub notion: NotionConfig,
    pub git_binary: String,
    pub enabled_groups: Vec<ToolGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    /// "me" for the authenticated account
    pub user_id: String,
    pub max_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: String,
    pub api_version: String,
    pub base_url: String,
    pub page_size: u64,
}

/// Tool groups that can be switched on and off as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    Notes,
    Mail,
    Calendar,
    Tasks,
    Git,
    Notion,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 6] = [
        ToolGroup::Notes,
        ToolGroup::Mail,
        ToolGroup::Calendar,
        ToolGroup::Tasks,
        ToolGroup::Git,
        ToolGroup::Notion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolGroup::Notes => "notes",
            ToolGroup::Mail => "mail",
            ToolGroup::Calendar => "calendar",
            ToolGroup::Tasks => "tasks",
            ToolGroup::Git => "git",
            ToolGroup::Notion => "notion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notes" | "note" => Some(ToolGroup::Notes),
            "mail" | "gmail" | "email" => Some(ToolGroup::Mail),
            "calendar" => Some(ToolGroup::Calendar),
            "tasks" => Some(ToolGroup::Tasks),
            "git" => Some(ToolGroup::Git),
            "notion" => Some(ToolGroup::Notion),
            _ => None,
        }
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for MistConfig {
    fn default() -> Self {
        Self {
            notes_dir: crate::paths::default_notes_dir(),
            google: GoogleConfig::default(),
            notion: NotionConfig::default(),
            git_binary: "git".to_string(),
            enabled_groups: ToolGroup::ALL.to_vec(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            user_id: "me".to_string(),
            max_results: 10,
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: "2022-02-22".to_string(),
            base_url: "https://api.notion.com/v1".to_string(),
            page_size: 100,
        }
    }
}

impl MistConfig {
    /// Load config: JSON file (if given and present), then environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let config: Self = serde_json::from_str(&content)?;
                log::info!("Config loaded from {:?}", p);
                config
            }
            Some(p) => {
                log::warn!("Config not found at {:?}, using defaults", p);
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply MIST_* overrides. `lookup` returns the value of a variable.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MIST_NOTES_DIR") {
            self.notes_dir = crate::paths::expand_home(&v);
        }
        if let Some(v) = get("MIST_GOOGLE_CREDENTIALS_PATH") {
            self.google.credentials_path = crate::paths::expand_home(&v);
        }
        if let Some(v) = get("MIST_GOOGLE_TOKEN_PATH") {
            self.google.token_path = crate::paths::expand_home(&v);
        }
        if let Some(v) = get("MIST_GOOGLE_USER_ID") {
            self.google.user_id = v;
        }
        if let Some(v) = get("MIST_GOOGLE_MAX_RESULTS") {
            match v.trim().parse() {
                Ok(n) => self.google.max_results = n,
                Err(_) => log::warn!("Ignoring MIST_GOOGLE_MAX_RESULTS={:?}: not a number", v),
            }
        }
        if let Some(v) = get("MIST_NOTION_API_KEY").or_else(|| get("NOTION_API_KEY")) {
            self.notion.api_key = v;
        }
        if let Some(v) = get("MIST_NOTION_API_VERSION") {
            self.notion.api_version = v;
        }
        if let Some(v) = get("MIST_NOTION_BASE_URL") {
            self.notion.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("MIST_NOTION_PAGE_SIZE") {
            match v.trim().parse() {
                Ok(n) => self.notion.page_size = n,
                Err(_) => log::warn!("Ignoring MIST_NOTION_PAGE_SIZE={:?}: not a number", v),
            }
        }
        if let Some(v) = get("MIST_GIT_BINARY") {
            self.git_binary = v;
        }
        if let Some(v) = get("MIST_TOOLS") {
            let mut groups = Vec::new();
            for part in v.split(',').filter(|p| !p.trim().is_empty()) {
                match ToolGroup::parse(part) {
                    Some(g) if !groups.contains(&g) => groups.push(g),
                    Some(_) => {}
                    None => log::warn!("Ignoring unknown tool group in MIST_TOOLS: {:?}", part),
                }
            }
            self.enabled_groups = groups;
        }
    }

    pub fn is_enabled(&self, group: ToolGroup) -> bool {
        self.enabled_groups.contains(&group)
    }

    /// Human-readable summary with secrets masked
    pub fn summary(&self) -> String {
        let groups: Vec<&str> = self.enabled_groups.iter().map(|g| g.name()).collect();
        let notion_key = if self.notion.api_key.is_empty() { "(not set)" } else { "********" };
        format!(
            "Notes dir: {}\nGoogle credentials: {}\nGoogle token: {}\nGoogle user: {}\nGoogle max results: {}\nNotion API key: {}\nNotion API: {} (version {})\nGit binary: {}\nEnabled groups: {}",
            self.notes_dir.display(),
            self.google.credentials_path.display(),
            self.google.token_path.display(),
            self.google.user_id,
            self.google.max_results,
            notion_key,
            self.notion.base_url,
            self.notion.api_version,
            self.git_binary,
            if groups.is_empty() { "(none)".to_string() } else { groups.join(", ") },
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
