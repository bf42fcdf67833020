use crate::blend::history::read_json;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Which of the two blend participants a request acts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserKey {
    User1,
    User2,
}

impl UserKey {
    /// Key under which the user's tokens are stored
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKey::User1 => "user",
            UserKey::User2 => "user2",
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// JSON file of per-user OAuth tokens
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_all(&self) -> HashMap<String, StoredTokens> {
        read_json(&self.path).unwrap_or_default()
    }

    pub fn get(&self, user: UserKey) -> Option<StoredTokens> {
        self.load_all().remove(user.as_str())
    }

    pub fn access_token(&self, user: UserKey) -> Option<String> {
        self.get(user)
            .map(|tokens| tokens.access_token)
            .filter(|token| !token.is_empty())
    }

    pub fn refresh_token(&self, user: UserKey) -> Option<String> {
        self.get(user).and_then(|tokens| tokens.refresh_token)
    }

    /// Store a refreshed access token, keeping the user's other fields
    pub fn update_access_token(&self, user: UserKey, access_token: &str, expires_in: Option<u64>) -> Result<()> {
        let mut all = self.load_all();
        let entry = all.entry(user.as_str().to_string()).or_default();
        entry.access_token = access_token.to_string();
        if expires_in.is_some() {
            entry.expires_in = expires_in;
        }

        let json = serde_json::to_string_pretty(&all)?;
        self.replace_file(json.as_bytes())
            .with_context(|| format!("Failed to write tokens to {}", self.path.display()))
    }

    /// Write through a temporary file in the same directory so readers never see a partial file
    fn replace_file(&self, contents: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(contents)?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
