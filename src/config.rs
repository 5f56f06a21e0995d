//! Configuration: server options and persisted user settings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pdf-desk";
const SETTINGS_FILE: &str = "settings.json";

/// User preferences persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Render pages with inverted colors
    pub dark_mode: bool,
}

/// Loads and saves [`Settings`] as JSON at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the application's default location:
    /// `$PDF_DESK_CONFIG_DIR`, else `$XDG_CONFIG_HOME/pdf-desk`, else
    /// `$HOME/.config/pdf-desk`, else the working directory.
    pub fn default_location() -> Self {
        let dir = std::env::var_os("PDF_DESK_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("XDG_CONFIG_HOME").map(|d| PathBuf::from(d).join(APP_DIR))
            })
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config").join(APP_DIR))
            })
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings; a missing file yields the defaults
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| Error::Settings {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Settings {
            reason: format!("failed to decode {}: {}", self.path.display(), e),
        })
    }

    /// Write settings, replacing the file atomically
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Resource and rendering configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories PDFs may be read from and written to. Empty allows all paths.
    pub resource_dirs: Vec<String>,
    /// Where user settings are persisted; `None` keeps them in memory only
    pub settings_store: Option<SettingsStore>,
    /// Width of generated thumbnails in pixels (default: 160)
    pub thumbnail_width: u32,
    /// Maximum pixel area of a rendered or exported page (default: 100_000_000)
    pub max_render_pixels: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            settings_store: None,
            thumbnail_width: 160,
            max_render_pixels: 100_000_000,
        }
    }
}
