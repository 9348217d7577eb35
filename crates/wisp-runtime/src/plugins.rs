//! Plugin Loader
//!
//! One-shot bootstrap for the optional plugin subsystem. The runtime only
//! depends on the activation contract; what a loader actually starts is
//! its own business.

use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Plugin activation errors
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("bundle manifest unreadable: {0}")]
    Manifest(#[from] std::io::Error),

    #[error("bundle manifest invalid: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error("bundle asset missing: {0}")]
    MissingAsset(String),

    #[error("activation failed: {0}")]
    Activation(String),
}

/// External bootstrap for the plugin subsystem.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Activate the plugin subsystem. Called at most once per successful
    /// activation; a failure makes the runtime retry on the next apply.
    async fn activate(&self) -> Result<(), PluginError>;
}

/// Default loader: nothing to start.
#[derive(Debug, Default)]
pub struct NullPluginLoader;

#[async_trait]
impl PluginLoader for NullPluginLoader {
    async fn activate(&self) -> Result<(), PluginError> {
        debug!("no plugin bundle configured");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BundleManifest {
    version: String,
    preload: String,
    main: String,
}

/// Loader over an on-disk plugin bundle: a directory holding
/// `manifest.json` plus the preload and main scripts it names. Activation
/// validates the bundle; the shell injects the scripts itself.
#[derive(Debug)]
pub struct BundlePluginLoader {
    dir: PathBuf,
}

impl BundlePluginLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn manifest(&self) -> Result<BundleManifest, PluginError> {
        let contents = fs::read_to_string(self.dir.join("manifest.json"))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl PluginLoader for BundlePluginLoader {
    async fn activate(&self) -> Result<(), PluginError> {
        let manifest = self.manifest()?;

        for asset in [&manifest.preload, &manifest.main] {
            if !self.dir.join(asset).is_file() {
                return Err(PluginError::MissingAsset(asset.clone()));
            }
        }

        info!(
            "plugin bundle {} ready ({})",
            manifest.version,
            self.dir.display()
        );
        Ok(())
    }
}
