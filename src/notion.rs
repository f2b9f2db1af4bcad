// MIST Gateway - Notion Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Notion REST API: databases, pages, blocks and search.
// Responses are returned as pretty-printed JSON.

use crate::config::NotionConfig;
use crate::error::{ToolError, ToolResult};
use crate::http::{endpoint, ApiClient};
use reqwest::Url;
use serde_json::{json, Value};

/// Notion rejects page_size above 100
const MAX_PAGE_SIZE: u64 = 100;

/// Pagination and filtering shared by list-style calls
#[derive(Debug, Clone, Default)]
pub struct Paging {
    pub start_cursor: Option<String>,
    pub page_size: Option<u64>,
}

pub struct NotionClient {
    http: ApiClient,
    config: NotionConfig,
}

fn pretty(value: &Value) -> ToolResult {
    Ok(serde_json::to_string_pretty(value)?)
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self, ToolError> {
        if config.api_key.trim().is_empty() {
            return Err(ToolError::auth("NOTION_API_KEY not found in environment variables"));
        }
        Ok(Self {
            http: ApiClient::new("Notion")?,
            config: config.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ToolError> {
        endpoint(&self.config.base_url, segments)
    }

    fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.config.page_size)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let request = self
            .http
            .inner()
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.api_version)
            .query(query);
        self.http.send_json(request)
    }

    fn send(&self, method: reqwest::Method, url: Url, body: &Value) -> Result<Value, ToolError> {
        let request = self
            .http
            .inner()
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.api_version)
            .json(body);
        self.http.send_json(request)
    }

    // ====== notion_list_databases ======

    pub fn list_databases(&self) -> ToolResult {
        let body = json!({
            "filter": {"property": "object", "value": "database"},
            "page_size": self.page_size(None),
            "sort": {"direction": "descending", "timestamp": "last_edited_time"},
        });
        let data = self.send(reqwest::Method::POST, self.url(&["search"])?, &body)?;
        let databases = data["results"].as_array().cloned().unwrap_or_default();
        pretty(&json!({"databases": databases}))
    }

    // ====== notion_get_database ======

    pub fn get_database(&self, database_id: &str) -> ToolResult {
        pretty(&self.get(self.url(&["databases", database_id])?, &[])?)
    }

    // ====== notion_query_database ======

    pub fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
        sorts: Option<Value>,
        paging: &Paging,
    ) -> ToolResult {
        let body = query_body(filter, sorts, paging, self.page_size(paging.page_size));
        let url = self.url(&["databases", database_id, "query"])?;
        pretty(&self.send(reqwest::Method::POST, url, &body)?)
    }

    // ====== notion_create_page ======

    pub fn create_page(&self, database_id: &str, properties: Value, children: Option<Value>) -> ToolResult {
        let mut body = json!({
            "parent": {"database_id": database_id},
            "properties": properties,
        });
        if let Some(children) = children.filter(|c| c.as_array().map_or(true, |a| !a.is_empty())) {
            body["children"] = children;
        }
        let page = self.send(reqwest::Method::POST, self.url(&["pages"])?, &body)?;
        log::info!("Notion page created: {}", page["id"].as_str().unwrap_or("?"));
        pretty(&page)
    }

    // ====== notion_update_page ======

    pub fn update_page(&self, page_id: &str, properties: Value, archived: Option<bool>) -> ToolResult {
        let mut body = json!({"properties": properties});
        if let Some(archived) = archived {
            body["archived"] = json!(archived);
        }
        let page = self.send(reqwest::Method::PATCH, self.url(&["pages", page_id])?, &body)?;
        log::info!("Notion page updated: {}", page_id);
        pretty(&page)
    }

    // ====== notion_get_block_children ======

    pub fn get_block_children(&self, block_id: &str, paging: &Paging) -> ToolResult {
        let mut query = vec![("page_size", self.page_size(paging.page_size).to_string())];
        if let Some(cursor) = &paging.start_cursor {
            query.push(("start_cursor", cursor.clone()));
        }
        pretty(&self.get(self.url(&["blocks", block_id, "children"])?, &query)?)
    }

    // ====== notion_search ======

    pub fn search(&self, query: &str, filter: Option<Value>, sort: Option<Value>, paging: &Paging) -> ToolResult {
        let body = search_body(query, filter, sort, paging, self.page_size(paging.page_size));
        let data = self.send(reqwest::Method::POST, self.url(&["search"])?, &body)?;
        pretty(&search_results(&data))
    }
}

pub fn query_body(filter: Option<Value>, sorts: Option<Value>, paging: &Paging, page_size: u64) -> Value {
    let mut body = json!({"page_size": page_size});
    if let Some(f) = filter {
        body["filter"] = f;
    }
    if let Some(s) = sorts {
        body["sorts"] = s;
    }
    if let Some(cursor) = &paging.start_cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

pub fn search_body(query: &str, filter: Option<Value>, sort: Option<Value>, paging: &Paging, page_size: u64) -> Value {
    let mut body = json!({"query": query, "page_size": page_size});
    if let Some(f) = filter {
        body["filter"] = f;
    }
    if let Some(s) = sort {
        body["sort"] = s;
    }
    if let Some(cursor) = &paging.start_cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

/// Keep only page and database results, with pagination info
pub fn search_results(data: &Value) -> Value {
    let results: Vec<Value> = data["results"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|item| matches!(item["object"].as_str(), Some("page") | Some("database")))
        .cloned()
        .collect();
    json!({
        "object": "list",
        "results": results,
        "next_cursor": data.get("next_cursor").cloned().unwrap_or(Value::Null),
        "has_more": data["has_more"].as_bool().unwrap_or(false),
    })
}

// ============================================================================
// TESTS
// ============================================================================
