//! Shell Configuration
//!
//! The persisted settings snapshot and its JSON round trip. The engine
//! only ever consumes snapshots by value; the store owns the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// One settings snapshot. Every field is optional on the wire so a
/// partial or legacy file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub enable_blockers: bool,
    #[serde(default)]
    pub enable_perf_css: bool,
    #[serde(default)]
    pub enable_theme: bool,
    #[serde(default)]
    pub enable_plugins: bool,
    #[serde(default)]
    pub theme_path: Option<String>,
    #[serde(default)]
    pub theme_css: Option<String>,
}

impl AppConfig {
    /// Upgrade an untouched snapshot to the shipped defaults: blockers
    /// and performance mode on, everything else off.
    pub fn sanitize(mut self) -> Self {
        let untouched = !self.enable_blockers
            && !self.enable_perf_css
            && !self.enable_theme
            && !self.enable_plugins
            && self.theme_path.is_none()
            && self.theme_css.is_none();
        if untouched {
            self.enable_blockers = true;
            self.enable_perf_css = true;
        }
        self
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File-backed settings store with an in-memory current copy.
pub struct ConfigStore {
    path: PathBuf,
    current: Mutex<AppConfig>,
}

impl ConfigStore {
    /// Store over `path`. Nothing is read until [`ConfigStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Mutex::new(AppConfig::default().sanitize()),
        }
    }

    /// The settings file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current in-memory snapshot.
    pub fn get(&self) -> AppConfig {
        self.current.lock().unwrap().clone()
    }

    /// Replace the in-memory snapshot (sanitized) without persisting.
    pub fn set(&self, cfg: AppConfig) -> AppConfig {
        let cfg = cfg.sanitize();
        *self.current.lock().unwrap() = cfg.clone();
        cfg
    }

    /// Read the settings file, falling back to defaults when it does not
    /// exist yet (and writing the defaults back so the file appears).
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let cfg = if self.path.exists() {
            let contents = fs::read_to_string(&self.path)?;
            serde_json::from_str::<AppConfig>(&contents)?
        } else {
            AppConfig::default()
        };

        let cfg = self.set(cfg);
        if !self.path.exists() {
            if let Err(err) = self.write(&cfg) {
                warn!("could not seed settings file: {err}");
            }
        }
        Ok(cfg)
    }

    /// Sanitize, persist, and return the stored snapshot.
    pub fn save(&self, cfg: AppConfig) -> Result<AppConfig, ConfigError> {
        let cfg = self.set(cfg);
        self.write(&cfg)?;
        info!("settings saved to {}", self.path.display());
        Ok(cfg)
    }

    fn write(&self, cfg: &AppConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
