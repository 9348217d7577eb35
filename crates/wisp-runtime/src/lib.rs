//! Wisp Runtime
//!
//! Configuration-driven orchestration of the shell's in-page features:
//! network blocking, performance CSS, theming, and the optional plugin
//! subsystem. The embedding shell loads a settings snapshot and hands it
//! to [`Runtime::apply`]; everything downstream is idempotent, so the
//! same snapshot can be applied as often as the settings UI fires.

mod config;
mod plugins;
mod runtime;
mod theme;

pub use config::{AppConfig, ConfigError, ConfigStore};
pub use plugins::{BundlePluginLoader, NullPluginLoader, PluginError, PluginLoader};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeStatus};
pub use theme::{select_theme_css, FsThemeResolver, ThemeError, ThemeResolver};
