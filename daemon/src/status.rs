use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::bridge::SessionState;
use crate::history::RecentEvent;
use crate::model::ClassifiedEvent;

/// Runtime status written by the daemon to `status.toml` for other tools to read.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Whether notifications are currently being forwarded.
    pub state: SessionState,
    /// Result of the most recent notification-access check.
    pub access_granted: bool,
    /// Notifications handed to the sink since startup.
    pub delivered: u64,
    /// Display name of the app behind the latest notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_app: Option<String>,
    /// RFC 3339 post time of the latest notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_timestamp: Option<String>,
    /// Human-readable error message for the last failed control operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Notifications seen per category, keyed by wire name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, u64>,
    /// App, category and post time of the most recent notifications, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent: Vec<RecentEvent>,
}

impl DaemonStatus {
    /// Constructs the initial stopped status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: SessionState::Stopped,
            access_granted: false,
            delivered: 0,
            last_app: None,
            last_event_timestamp: None,
            error: None,
            categories: BTreeMap::new(),
            recent: Vec::new(),
        }
    }

    /// Accounts for one notification handed to the sink.
    pub fn record_event(&mut self, event: &ClassifiedEvent) {
        self.delivered += 1;
        *self
            .categories
            .entry(event.category.as_str().to_string())
            .or_insert(0) += 1;
        self.last_app = Some(event.display_name.clone());
        self.last_event_timestamp =
            chrono::DateTime::from_timestamp_millis(event.posted_at_millis).map(|t| t.to_rfc3339());
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Errors are logged; a status write failure never stops the daemon.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create status directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                error!("Failed to write status file: {e}");
            }
        }
        Err(e) => error!("Failed to serialize status: {e}"),
    }
}

/// The in-memory status plus the file it is mirrored to.
pub struct StatusFile {
    path: PathBuf,
    current: Mutex<DaemonStatus>,
}

impl StatusFile {
    /// Starts from [`DaemonStatus::new`] and writes it out immediately.
    pub fn create(path: PathBuf) -> Self {
        let current = DaemonStatus::new();
        write_status(&path, &current);
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    /// Applies `change` and rewrites the file.
    pub fn update(&self, change: impl FnOnce(&mut DaemonStatus)) {
        let mut status = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut status);
        write_status(&self.path, &status);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> DaemonStatus {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
