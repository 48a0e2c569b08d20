//! Persistent storage for the bearer token
//!
//! The store keeps one token in memory and mirrors it to a small JSON file
//! under the fixed key `token`. The in-memory copy is authoritative: a failed
//! write is reported but the process keeps using the new value.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::Config;

const SESSION_FILE: &str = "session.json";

#[derive(Serialize, Deserialize, Default)]
struct StoredSession {
    token: Option<String>,
}

#[derive(Debug)]
pub struct TokenStore {
    path: Option<PathBuf>,
    token: RwLock<Option<String>>,
}

impl TokenStore {
    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            token: RwLock::new(None),
        }
    }

    /// Open the store backed by `path`, loading any token already saved there.
    /// An unreadable or corrupt file is treated as "no token".
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = match read_token(&path) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        };
        Self {
            path: Some(path),
            token: RwLock::new(token),
        }
    }

    /// Open the store in the user's config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(Config::config_dir()?.join(SESSION_FILE)))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .map(|t| (*t).clone())
            .unwrap_or_else(|poisoned| (*poisoned.into_inner()).clone())
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.replace(Some(token.to_string()));
        self.persist()
    }

    pub fn clear(&self) -> Result<()> {
        self.replace(None);
        match &self.path {
            Some(path) if path.exists() => fs::remove_file(path)
                .with_context(|| format!("removing {}", path.display())),
            _ => Ok(()),
        }
    }

    fn replace(&self, value: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSession { token: self.get() };
        fs::write(path, serde_json::to_string_pretty(&stored)?)
            .with_context(|| format!("writing {}", path.display()))
    }
}

fn read_token(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let stored: StoredSession = serde_json::from_str(&content)?;
    Ok(stored.token.filter(|t| !t.is_empty()))
}
