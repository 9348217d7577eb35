//! Theme Resolution
//!
//! Picks the CSS text a configuration implies. Inline CSS wins over a
//! theme file; a file that cannot be read counts as "no content" so the
//! theme sheet is removed rather than left stale.

use crate::config::AppConfig;
use std::fs;
use thiserror::Error;
use tracing::warn;

/// Theme loading errors
#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("theme file is empty")]
    Empty,
}

/// Collaborator that turns a theme path into literal CSS text.
pub trait ThemeResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<String, ThemeError>;
}

/// Filesystem resolver used by the real shell.
#[derive(Debug, Default)]
pub struct FsThemeResolver;

impl ThemeResolver for FsThemeResolver {
    fn resolve(&self, path: &str) -> Result<String, ThemeError> {
        let css = fs::read_to_string(path)?;
        if css.trim().is_empty() {
            return Err(ThemeError::Empty);
        }
        Ok(css)
    }
}

/// The CSS the theme sheet should carry under `cfg`, or `None` when the
/// sheet should be absent.
pub fn select_theme_css(cfg: &AppConfig, resolver: &dyn ThemeResolver) -> Option<String> {
    if !cfg.enable_theme {
        return None;
    }

    if let Some(css) = cfg.theme_css.as_deref() {
        if !css.trim().is_empty() {
            return Some(css.to_owned());
        }
    }

    let path = cfg.theme_path.as_deref()?;
    match resolver.resolve(path) {
        Ok(css) => Some(css),
        Err(err) => {
            warn!("theme {path} not applied: {err}");
            None
        }
    }
}
