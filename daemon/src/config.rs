use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::DaemonEvent;

pub const DEFAULT_APP_ID: &str = "com.sentinel.daemon";
pub const MIN_QUEUE_CAPACITY: u32 = 1;
pub const MAX_QUEUE_CAPACITY: u32 = 4096;
pub const DEFAULT_QUEUE_CAPACITY: u32 = 64;
pub const MIN_HISTORY_LENGTH: u32 = 5;
pub const MAX_HISTORY_LENGTH: u32 = 200;
pub const DEFAULT_HISTORY_LENGTH: u32 = 20;

/// Root configuration structure. Deserialized from `<app dir>/config.toml`.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Identifier looked up in the enabled-listeners registry.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// File holding the colon-separated enabled-listeners list.
    /// Defaults to `<app dir>/enabled_listeners`.
    #[serde(default)]
    pub listeners_registry: Option<PathBuf>,
    /// Program and arguments launched when notification access is requested.
    #[serde(default)]
    pub settings_command: Option<Vec<String>>,
    /// Whether notifications should be forwarded. Toggling it on reload
    /// starts or stops the session.
    #[serde(default = "default_listening")]
    pub listening: bool,
    /// Bound of the listener queue. Clamped to [1, 4096].
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: u32,
    /// Number of recent notifications kept in the status file. Clamped to [5, 200].
    #[serde(default = "default_history_length")]
    pub history_length: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            listeners_registry: None,
            settings_command: None,
            listening: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            history_length: DEFAULT_HISTORY_LENGTH,
        }
    }
}

impl GlobalConfig {
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .clamp(MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY) as usize
    }

    pub fn effective_history_length(&self) -> u32 {
        self.history_length
            .clamp(MIN_HISTORY_LENGTH, MAX_HISTORY_LENGTH)
    }

    /// Returns the configured registry path, falling back to `default`.
    pub fn registry_path(&self, default: PathBuf) -> PathBuf {
        self.listeners_registry.clone().unwrap_or(default)
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Watches the config file and sends `ConfigReloaded` whenever it is
/// created or modified and still parses.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    watch_file(path, tx, |path| match load_or_default(path) {
        Ok(config) => Some(DaemonEvent::ConfigReloaded(config)),
        Err(e) => {
            error!("Failed to reload config: {e:#}");
            None
        }
    })
    .await
}

/// Watches the enabled-listeners registry and sends `AccessChanged` on every write.
pub async fn watch_registry(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    watch_file(path, tx, |_| Some(DaemonEvent::AccessChanged)).await
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the file
/// is created or modified, `on_change` decides which event (if any) to send.
async fn watch_file<F>(path: PathBuf, tx: mpsc::Sender<DaemonEvent>, on_change: F)
where
    F: Fn(&Path) -> Option<DaemonEvent>,
{
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create file watcher for {}: {e}", path.display());
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename) and files created later.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            error!("{} has no parent directory to watch", path.display());
            return;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&watch_dir) {
        warn!("Failed to create {}: {e}", watch_dir.display());
    }

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        error!("Failed to watch {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        if !affects(&event, &path) {
            continue;
        }
        if let Some(daemon_event) = on_change(&path) {
            if tx.send(daemon_event).await.is_err() {
                break;
            }
        }
    }
}

/// True for a create/modify event that touches `path`.
fn affects(event: &notify::Event, path: &Path) -> bool {
    let touches_path = event.paths.iter().any(|p| p == path);
    let is_write = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    touches_path && is_write
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_listening() -> bool {
    true
}

fn default_queue_capacity() -> u32 {
    DEFAULT_QUEUE_CAPACITY
}

fn default_history_length() -> u32 {
    DEFAULT_HISTORY_LENGTH
}
