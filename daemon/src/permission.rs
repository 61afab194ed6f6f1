/// Notification-access capability check.
///
/// The OS keeps a colon-separated list of listener identifiers that were
/// granted notification access.  This app counts as granted when any token of
/// that list *contains* its identifier.  This is substring containment, not
/// token equality, so an identifier embedded in another app's identifier also
/// matches.
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// Where the enabled-listener registry lives and how to open its settings page.
pub trait CapabilitySource: Send + Sync {
    /// Returns the raw colon-separated registry value, or `None` when unset.
    fn enabled_listeners(&self) -> Result<Option<String>>;
    /// Asks the platform to show the notification-access settings surface.
    fn launch_settings(&self) -> Result<()>;
}

/// Registry backed by a plain file holding the colon-separated listener list.
pub struct RegistryFile {
    path: PathBuf,
    /// Program and arguments spawned by [`CapabilitySource::launch_settings`].
    settings_command: Option<Vec<String>>,
}

impl RegistryFile {
    pub fn new(path: PathBuf, settings_command: Option<Vec<String>>) -> Self {
        Self {
            path,
            settings_command,
        }
    }
}

impl CapabilitySource for RegistryFile {
    fn enabled_listeners(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read listener registry: {}", self.path.display())
        })?;
        Ok(Some(content.trim().to_string()))
    }

    fn launch_settings(&self) -> Result<()> {
        let Some((program, args)) = self
            .settings_command
            .as_ref()
            .and_then(|cmd| cmd.split_first())
        else {
            info!(
                registry = %self.path.display(),
                "No settings command configured; grant access by adding this app to the registry"
            );
            return Ok(());
        };

        Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("Failed to launch settings command '{program}'"))?;
        Ok(())
    }
}

/// Answers "may this app receive notifications?" and opens the settings page.
#[derive(Clone)]
pub struct PermissionGate {
    app_id: String,
    source: Arc<dyn CapabilitySource>,
}

impl PermissionGate {
    pub fn new(app_id: impl Into<String>, source: Arc<dyn CapabilitySource>) -> Self {
        Self {
            app_id: app_id.into(),
            source,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Looks the app up in the registry, propagating read failures.
    pub fn check(&self) -> Result<bool> {
        let flat = self.source.enabled_listeners()?;
        Ok(flat
            .as_deref()
            .map(|flat| listed_in(flat, &self.app_id))
            .unwrap_or(false))
    }

    /// Like [`check`](Self::check) but treats an unreadable registry as "not granted".
    pub fn is_granted(&self) -> bool {
        self.check().unwrap_or_else(|e| {
            warn!("Permission check failed: {e:#}");
            false
        })
    }

    /// Requests the settings surface. Returns once the request is issued; does
    /// not wait for the user to act on it.
    pub fn request_access(&self) -> Result<()> {
        if self.app_id.is_empty() {
            bail!("Cannot request access without an app identifier");
        }
        self.source.launch_settings()?;
        info!(app_id = %self.app_id, "Requested notification access");
        Ok(())
    }
}

/// True when any colon-separated token of `flat` contains `app_id`.
pub fn listed_in(flat: &str, app_id: &str) -> bool {
    !flat.is_empty() && flat.split(':').any(|name| name.contains(app_id))
}
