// MIST Gateway - Google OAuth Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Authorized-user token store (token.json) with refresh, and a small
// authenticated JSON client shared by the Gmail, Calendar and Tasks tools.
// The consent flow is not run here: token.json must already exist.

use crate::config::GoogleConfig;
use crate::error::ToolError;
use crate::http::ApiClient;
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Token counts as expired this long before its recorded expiry
const EXPIRY_SKEW_SECS: i64 = 60;

/// Scopes the token is expected to carry
pub const GOOGLE_API_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/tasks",
    "https://www.googleapis.com/auth/tasks.readonly",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/calendar.readonly",
];

/// token.json in the authorized-user layout. Unknown fields are preserved
/// on write-back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, alias = "access_token", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredToken {
    /// No access token, or one that expires within the skew window.
    /// A token without a recorded expiry is taken as valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map_or(true, str::is_empty) {
            return true;
        }
        match self.expiry.as_deref().and_then(parse_expiry) {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }

    /// Expected scopes the token was not granted. A token that records no
    /// scopes is not checked.
    pub fn missing_scopes(&self) -> Vec<&'static str> {
        if self.scopes.is_empty() {
            return Vec::new();
        }
        GOOGLE_API_SCOPES
            .iter()
            .copied()
            .filter(|s| !self.scopes.iter().any(|granted| granted == s))
            .collect()
    }

    /// Merge a token endpoint response
    pub fn apply_refresh(&mut self, response: &Value, now: DateTime<Utc>) -> Result<(), ToolError> {
        let access = response
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::auth("Token refresh response carried no access_token"))?;
        self.token = Some(access.to_string());
        if let Some(rt) = response.get("refresh_token").and_then(|v| v.as_str()) {
            self.refresh_token = Some(rt.to_string());
        }
        self.expiry = response
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .map(|secs| (now + Duration::seconds(secs)).to_rfc3339_opts(SecondsFormat::Secs, true));
        Ok(())
    }
}

/// Accepts RFC 3339 and the naive UTC form google-auth writes
/// ("2024-05-01T12:00:00.123456Z" or without the zone)
pub fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// OAuth client id, secret and token uri from credentials.json
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: Option<String>,
}

/// Read the `installed` or `web` section of a client secrets document
pub fn client_secrets(doc: &Value) -> Option<ClientSecrets> {
    let section = doc.get("installed").or_else(|| doc.get("web"))?;
    Some(ClientSecrets {
        client_id: section.get("client_id")?.as_str()?.to_string(),
        client_secret: section.get("client_secret")?.as_str()?.to_string(),
        token_uri: section.get("token_uri").and_then(|v| v.as_str()).map(str::to_string),
    })
}

/// token.json + credentials.json on disk
pub struct TokenStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl TokenStore {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn load(&self) -> Result<StoredToken, ToolError> {
        if !self.token_path.exists() {
            if !self.credentials_path.exists() {
                return Err(ToolError::auth(format!(
                    "Credentials file not found at {}. Please download your OAuth credentials from Google Cloud Console.",
                    self.credentials_path.display()
                )));
            }
            return Err(ToolError::auth(format!(
                "No Google token at {}. Complete the OAuth consent flow for {} and save the authorized-user token to {}.",
                self.token_path.display(),
                self.credentials_path.display(),
                self.token_path.display()
            )));
        }
        let content = std::fs::read_to_string(&self.token_path)?;
        serde_json::from_str(&content).map_err(|e| {
            ToolError::auth(format!("Token file at {} is invalid: {}", self.token_path.display(), e))
        })
    }

    /// Write via tmp file + rename
    pub fn save(&self, token: &StoredToken) -> Result<(), ToolError> {
        let tmp = self.token_path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(token)?)?;
        std::fs::rename(&tmp, &self.token_path)?;
        Ok(())
    }

    /// Client secrets from the token itself, else from credentials.json
    fn secrets_for(&self, token: &StoredToken) -> Result<ClientSecrets, ToolError> {
        if let (Some(id), Some(secret)) = (&token.client_id, &token.client_secret) {
            return Ok(ClientSecrets {
                client_id: id.clone(),
                client_secret: secret.clone(),
                token_uri: token.token_uri.clone(),
            });
        }
        let doc: Value = match std::fs::read_to_string(&self.credentials_path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ToolError::auth(format!(
                    "Credentials file at {} is invalid: {}",
                    self.credentials_path.display(),
                    e
                ))
            })?,
            Err(_) => {
                return Err(ToolError::auth(format!(
                    "Credentials file not found at {}. Please download your OAuth credentials from Google Cloud Console.",
                    self.credentials_path.display()
                )))
            }
        };
        client_secrets(&doc).ok_or_else(|| {
            ToolError::auth(format!(
                "Credentials file at {} has no installed or web client section",
                self.credentials_path.display()
            ))
        })
    }
}

/// Authenticated client for the Google REST APIs
pub struct GoogleClient {
    http: ApiClient,
    store: TokenStore,
    token: StoredToken,
    user_id: String,
}

impl GoogleClient {
    /// Load the token store. Does not touch the network.
    pub fn connect(config: &GoogleConfig) -> Result<Self, ToolError> {
        let store = TokenStore::new(&config.credentials_path, &config.token_path);
        let token = store.load()?;
        log::info!("Google token loaded from {:?}", store.token_path());
        let missing = token.missing_scopes();
        if !missing.is_empty() {
            log::warn!("Google token lacks scopes, some tools will be refused: {}", missing.join(", "));
        }
        Ok(Self {
            http: ApiClient::new("Google")?,
            store,
            token,
            user_id: config.user_id.clone(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current access token, refreshing and persisting it when expired
    fn access_token(&mut self) -> Result<String, ToolError> {
        let now = Utc::now();
        if self.token.is_expired(now) {
            self.refresh(now)?;
        }
        self.token
            .token
            .clone()
            .ok_or_else(|| ToolError::auth("Google token has no access token"))
    }

    fn refresh(&mut self, now: DateTime<Utc>) -> Result<(), ToolError> {
        let refresh_token = self.token.refresh_token.clone().ok_or_else(|| {
            ToolError::auth(format!(
                "Google token at {} has expired and carries no refresh token. Re-run the consent flow.",
                self.store.token_path().display()
            ))
        })?;
        let secrets = self.store.secrets_for(&self.token)?;
        let token_uri = self
            .token
            .token_uri
            .clone()
            .or(secrets.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        log::info!("Refreshing Google access token");
        let form = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self
            .http
            .send_json_as("Google OAuth", self.http.inner().post(&token_uri).form(&form))
            .map_err(|e| ToolError::auth(format!("Token refresh failed: {}", e)))?;

        self.token.apply_refresh(&response, now)?;
        if let Err(e) = self.store.save(&self.token) {
            log::warn!("Refreshed token could not be saved: {}", e);
        }
        Ok(())
    }

    /// One authenticated JSON request
    pub fn call(
        &mut self,
        service: &'static str,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ToolError> {
        let token = self.access_token()?;
        log::debug!("{} {} {}", service, method, url.path());
        let mut request = self.http.inner().request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        self.http.send_json_as(service, request)
    }

    pub fn get(&mut self, service: &'static str, url: Url, query: &[(&str, String)]) -> Result<Value, ToolError> {
        self.call(service, Method::GET, url, query, None)
    }

    pub fn post(&mut self, service: &'static str, url: Url, query: &[(&str, String)], body: &Value) -> Result<Value, ToolError> {
        self.call(service, Method::POST, url, query, Some(body))
    }

    pub fn put(&mut self, service: &'static str, url: Url, query: &[(&str, String)], body: &Value) -> Result<Value, ToolError> {
        self.call(service, Method::PUT, url, query, Some(body))
    }

    pub fn patch(&mut self, service: &'static str, url: Url, body: &Value) -> Result<Value, ToolError> {
        self.call(service, Method::PATCH, url, &[], Some(body))
    }

    pub fn delete(&mut self, service: &'static str, url: Url, query: &[(&str, String)]) -> Result<Value, ToolError> {
        self.call(service, Method::DELETE, url, query, None)
    }
}

// ============================================================================
// TESTS
// ============================================================================
