//! Configuration loading and persistence.
//!
//! Reads `config.json` from the bridge's config directory, falling back to
//! defaults for anything missing, then applies environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_APP_URL, DEFAULT_EXCLUDE_GLOBS, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_INCLUDE_GLOB,
    DEFAULT_PANEL_TITLE, DEFAULT_SESSION_KEY, INLINE_COMPLETION_TIMEOUT,
};

/// Configuration for the bridge.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// URL of the embedded chat application.
    pub app_url: String,
    /// Session key of the chat panel.
    pub session_key: String,
    /// Title shown on the chat panel.
    pub panel_title: String,
    /// Milliseconds an inline completion waits for its result.
    pub completion_timeout_ms: u64,
    /// Glob selecting files offered by `getWorkspaceFiles`.
    pub include_glob: String,
    /// Globs excluded from `getWorkspaceFiles` and watcher broadcasts.
    pub exclude_globs: Vec<String>,
    /// Extensions (no dot) classified as `image`.
    pub image_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            panel_title: DEFAULT_PANEL_TITLE.to_string(),
            completion_timeout_ms: u64::try_from(INLINE_COMPLETION_TIMEOUT.as_millis())
                .unwrap_or(3000),
            include_glob: DEFAULT_INCLUDE_GLOB.to_string(),
            exclude_globs: DEFAULT_EXCLUDE_GLOBS.iter().map(ToString::to_string).collect(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// Directory selection priority:
    /// 1. `CODEASSIST_CONFIG_DIR` env var: explicit override
    /// 2. Default: platform config dir joined with `codeassist-bridge`
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("CODEASSIST_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("codeassist-bridge"))
            .context("Could not determine config directory")
    }

    /// Path of the config file inside [`config_dir`](Self::config_dir).
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load the config file (or defaults) and apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CODEASSIST_APP_URL") {
            if !url.trim().is_empty() {
                self.app_url = url.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var("CODEASSIST_COMPLETION_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.completion_timeout_ms = ms,
                Err(e) => log::warn!("Ignoring CODEASSIST_COMPLETION_TIMEOUT_MS={raw:?}: {e}"),
            }
        }
    }

    /// Save the config as pretty JSON, creating the directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Inline completion timeout as a [`Duration`].
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}
