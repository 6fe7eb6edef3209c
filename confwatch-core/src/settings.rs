//! Client settings file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.confwatch/
//!   config.yaml   (mode 0600; every field optional)
//! ```
//!
//! Every function takes the home directory explicitly; callers resolve it
//! once at the binary boundary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SettingsError};
use crate::types::WatchKey;

/// Overrides `server_address` when set and non-empty.
pub const SERVER_ENV: &str = "CONFWATCH_SERVER";

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8848";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the registry, without the `/nacos` suffix.
    pub server_address: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub page_size: u32,
    /// Keys the daemon starts watching on boot.
    pub watches: Vec<WatchKey>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            watches: Vec::new(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Replace the server address when `value` is present and non-blank.
    pub fn apply_server_override(&mut self, value: Option<String>) {
        if let Some(value) = value {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.server_address = trimmed.trim_end_matches('/').to_string();
            }
        }
    }
}

/// `<home>/.confwatch/` — pure, no I/O.
pub fn confwatch_root(home: &Path) -> PathBuf {
    home.join(".confwatch")
}

/// `<home>/.confwatch/config.yaml` — pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    confwatch_root(home).join("config.yaml")
}

/// Load settings from `<home>/.confwatch/config.yaml`, then apply [`SERVER_ENV`].
///
/// A missing file yields [`Settings::default`]; malformed YAML returns
/// `SettingsError::Parse` with the file path.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let mut settings = load_file_at(home)?;
    settings.apply_server_override(std::env::var(SERVER_ENV).ok());
    Ok(settings)
}

/// Load the settings file only, without environment overrides.
pub fn load_file_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse { path, source: e })
}

/// Atomically save settings to `<home>/.confwatch/config.yaml`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let root = confwatch_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = settings_path_at(home);
    let tmp = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
