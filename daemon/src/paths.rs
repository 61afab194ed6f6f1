/// Canonical file paths for the daemon's data files.
///
/// All files live under the app data directory:
///   - config.toml        Written by the user, read (and watched) by the daemon.
///   - status.toml        Written by the daemon, read by other tools.
///   - enabled_listeners  Colon-separated list of apps granted notification access.
use std::path::PathBuf;

const APP_DIR_NAME: &str = "NotifSentinel";
const FALLBACK_DIR_NAME: &str = ".notif-sentinel";
pub const HOME_ENV_VAR: &str = "SENTINEL_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const REGISTRY_FILE_NAME: &str = "enabled_listeners";

/// Returns `$SENTINEL_HOME`, else `<platform data dir>/NotifSentinel`,
/// else `./.notif-sentinel`.
pub fn app_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR_NAME))
}

pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

/// Default location of the enabled-listeners registry.
pub fn registry_file_path() -> PathBuf {
    app_data_dir().join(REGISTRY_FILE_NAME)
}
