//! Credential store
//!
//! Durable identifier → session mapping. Read once before any account is
//! processed, written once after all complete, overwritten wholesale; the
//! run coordinator is the only owner, so no locking is needed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Best-known sessions for one account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredSession {
    /// Primary-site session token
    pub session: String,
    /// Federated secondary-site token, if one was ever minted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepflood: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The on-disk store: identifier → best-known sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    accounts: BTreeMap<String, StoredSession>,
}

impl CredentialStore {
    /// Default location under the platform config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nodeseek-checkin").join("sessions.json"))
    }

    /// Load from `path`. A missing or unreadable file yields an empty store;
    /// a stale store must never prevent a run.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(store) => {
                    info!("loaded credential store from {:?}", path);
                    store
                }
                Err(e) => {
                    warn!("credential store at {:?} is unparseable ({}), starting empty", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("failed to read credential store at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write the whole store to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("credential store saved to {:?}", path);
        Ok(())
    }

    pub fn primary_token(&self, identifier: &str) -> Option<&str> {
        self.accounts
            .get(identifier)
            .map(|s| s.session.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn secondary_token(&self, identifier: &str) -> Option<&str> {
        self.accounts
            .get(identifier)
            .and_then(|s| s.deepflood.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn record_primary(&mut self, identifier: &str, token: &str) {
        let entry = self.accounts.entry(identifier.to_string()).or_default();
        entry.session = token.to_string();
        entry.updated_at = Some(Utc::now());
    }

    pub fn record_secondary(&mut self, identifier: &str, token: &str) {
        let entry = self.accounts.entry(identifier.to_string()).or_default();
        entry.deepflood = Some(token.to_string());
        entry.updated_at = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
