//! Runtime Orchestrator
//!
//! Drives the interceptor, the style sheets, and the plugin loader to
//! whatever state a configuration snapshot implies. `apply` is
//! level-triggered: it converges on the snapshot regardless of prior
//! history, so it can be called repeatedly (on startup, after every
//! settings save, after a config reload) without accumulating state.
//! Nothing in here is allowed to take the host page down; every failure
//! degrades to "feature inactive".

use crate::config::AppConfig;
use crate::plugins::{NullPluginLoader, PluginLoader};
use crate::theme::{select_theme_css, FsThemeResolver, ThemeResolver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use wisp_net::{Classify, GlobalTable, Interceptor};
use wisp_style::{SheetId, StyleInjector, StyleSink, PERF_CSS};

/// Observable snapshot of the runtime's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub blockers_installed: bool,
    pub perf_active: bool,
    pub theme_active: bool,
    pub plugin_loaded: bool,
}

/// The process-wide runtime: one per page, owning the interceptor, the
/// sheet registry, the collaborator handles, and the last-applied
/// configuration. Constructed explicitly so tests get a fresh one per
/// case instead of sharing ambient globals.
pub struct Runtime {
    interceptor: Interceptor,
    styles: StyleInjector,
    themes: Arc<dyn ThemeResolver>,
    plugins: Arc<dyn PluginLoader>,
    plugin_loaded: Arc<AtomicBool>,
    current: Mutex<Option<AppConfig>>,
}

impl Runtime {
    /// Runtime over `table` with the stock collaborators.
    pub fn new(table: GlobalTable) -> Self {
        Self::builder(table).build()
    }

    /// Start a builder for a runtime with custom collaborators.
    pub fn builder(table: GlobalTable) -> RuntimeBuilder {
        RuntimeBuilder {
            table,
            sink: None,
            classifier: None,
            themes: Arc::new(FsThemeResolver),
            plugins: Arc::new(NullPluginLoader),
        }
    }

    /// Drive everything to the state `cfg` implies. Fire-and-forget:
    /// failures are logged and contained. Needs a tokio runtime context
    /// for the plugin activation task.
    pub fn apply(&self, cfg: AppConfig) {
        *self.current.lock().unwrap() = Some(cfg.clone());

        if cfg.enable_perf_css {
            self.styles.upsert(SheetId::Performance, PERF_CSS);
        } else {
            self.styles.remove(SheetId::Performance);
        }

        match select_theme_css(&cfg, self.themes.as_ref()) {
            Some(css) => self.styles.upsert(SheetId::Theme, &css),
            None => self.styles.remove(SheetId::Theme),
        }

        if cfg.enable_plugins && !self.plugin_loaded.load(Ordering::SeqCst) {
            // Claim the one-shot before the task runs so a rapid second
            // apply cannot start a second activation. A failure hands the
            // claim back for the next apply to retry.
            self.plugin_loaded.store(true, Ordering::SeqCst);
            let loader = self.plugins.clone();
            let loaded = self.plugin_loaded.clone();
            tokio::spawn(async move {
                match loader.activate().await {
                    Ok(()) => info!("plugin subsystem active"),
                    Err(err) => {
                        warn!("plugin activation failed: {err}");
                        loaded.store(false, Ordering::SeqCst);
                    }
                }
            });
        }

        if cfg.enable_blockers {
            self.interceptor.install();
        } else {
            self.interceptor.uninstall();
        }
    }

    /// Current state snapshot.
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            blockers_installed: self.interceptor.is_installed(),
            perf_active: self.styles.is_active(SheetId::Performance),
            theme_active: self.styles.is_active(SheetId::Theme),
            plugin_loaded: self.plugin_loaded.load(Ordering::SeqCst),
        }
    }

    /// The last configuration handed to [`Runtime::apply`].
    pub fn current_config(&self) -> Option<AppConfig> {
        self.current.lock().unwrap().clone()
    }

    /// Direct access to the interceptor, for hosts that toggle blocking
    /// without going through a full configuration.
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Direct access to the sheet registry.
    pub fn styles(&self) -> &StyleInjector {
        &self.styles
    }
}

/// Builder wiring custom collaborators into a [`Runtime`].
pub struct RuntimeBuilder {
    table: GlobalTable,
    sink: Option<Arc<dyn StyleSink>>,
    classifier: Option<Arc<dyn Classify>>,
    themes: Arc<dyn ThemeResolver>,
    plugins: Arc<dyn PluginLoader>,
}

impl RuntimeBuilder {
    /// Mirror sheet changes into `sink`.
    pub fn style_sink(mut self, sink: Arc<dyn StyleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the standard rule classifier.
    pub fn classifier(mut self, classifier: Arc<dyn Classify>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replace the filesystem theme resolver.
    pub fn theme_resolver(mut self, resolver: Arc<dyn ThemeResolver>) -> Self {
        self.themes = resolver;
        self
    }

    /// Replace the null plugin loader.
    pub fn plugin_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.plugins = loader;
        self
    }

    pub fn build(self) -> Runtime {
        let interceptor = match self.classifier {
            Some(classifier) => Interceptor::with_classifier(self.table, classifier),
            None => Interceptor::new(self.table),
        };
        let styles = match self.sink {
            Some(sink) => StyleInjector::with_sink(sink),
            None => StyleInjector::new(),
        };

        Runtime {
            interceptor,
            styles,
            themes: self.themes,
            plugins: self.plugins,
            plugin_loaded: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PluginError;
    use crate::theme::ThemeError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use wisp_net::{FetchFn, HttpResponse};

    fn bound_table() -> (GlobalTable, FetchFn) {
        let table = GlobalTable::new();
        let fetch: FetchFn = Arc::new(|_input, _init| {
            Box::pin(std::future::ready(Ok(HttpResponse::ok(Vec::new()))))
        });
        table.bind_fetch(fetch.clone());
        (table, fetch)
    }

    fn blockers_and_perf() -> AppConfig {
        AppConfig {
            enable_blockers: true,
            enable_perf_css: true,
            ..Default::default()
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    /// Let spawned activation tasks run to completion on the test runtime.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    struct FlakyLoader {
        attempts: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl PluginLoader for FlakyLoader {
        async fn activate(&self) -> Result<(), PluginError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(PluginError::Activation("bundle not ready".into()))
            } else {
                Ok(())
            }
        }
    }

    struct FixedTheme(&'static str);

    impl ThemeResolver for FixedTheme {
        fn resolve(&self, _path: &str) -> Result<String, ThemeError> {
            Ok(self.0.to_owned())
        }
    }

    struct BrokenTheme;

    impl ThemeResolver for BrokenTheme {
        fn resolve(&self, _path: &str) -> Result<String, ThemeError> {
            Err(ThemeError::Empty)
        }
    }

    #[tokio::test]
    async fn test_disabled_blockers_leave_originals_in_place() {
        let (table, original) = bound_table();
        let runtime = Runtime::new(table.clone());

        runtime.apply(AppConfig {
            enable_blockers: false,
            ..blockers_and_perf()
        });

        assert!(!runtime.status().blockers_installed);
        assert!(Arc::ptr_eq(&table.fetch_slot().unwrap(), &original));
    }

    #[tokio::test]
    async fn test_blockers_toggle_round_trip() {
        let (table, original) = bound_table();
        let runtime = Runtime::new(table.clone());

        runtime.apply(blockers_and_perf());
        assert!(runtime.status().blockers_installed);
        assert!(!Arc::ptr_eq(&table.fetch_slot().unwrap(), &original));

        runtime.apply(AppConfig {
            enable_blockers: false,
            ..blockers_and_perf()
        });
        assert!(!runtime.status().blockers_installed);
        assert!(Arc::ptr_eq(&table.fetch_slot().unwrap(), &original));
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let (table, _original) = bound_table();
        let runtime = Runtime::new(table.clone());
        let cfg = AppConfig {
            enable_theme: true,
            theme_css: Some("body{}".into()),
            ..blockers_and_perf()
        };

        runtime.apply(cfg.clone());
        let once = runtime.status();
        let wrapped = table.fetch_slot().unwrap();

        runtime.apply(cfg.clone());
        assert_eq!(runtime.status(), once);
        // Same wrapper, not a re-wrapped wrapper.
        assert!(Arc::ptr_eq(&table.fetch_slot().unwrap(), &wrapped));
        assert_eq!(runtime.current_config(), Some(cfg));
    }

    #[tokio::test]
    async fn test_perf_on_theme_off_scenario() {
        let (table, _) = bound_table();
        let runtime = Runtime::new(table);

        runtime.apply(AppConfig {
            enable_perf_css: true,
            enable_theme: false,
            enable_blockers: true,
            enable_plugins: false,
            ..Default::default()
        });
        settle().await;

        let status = runtime.status();
        assert!(status.perf_active);
        assert!(!status.theme_active);
        assert!(status.blockers_installed);
        assert!(!status.plugin_loaded);
        assert_eq!(
            runtime.styles().active(SheetId::Performance).as_deref(),
            Some(PERF_CSS)
        );
    }

    #[tokio::test]
    async fn test_inline_theme_css_wins_over_path() {
        let (table, _) = bound_table();
        let runtime = Runtime::builder(table)
            .theme_resolver(Arc::new(FixedTheme("/* from file */")))
            .build();

        runtime.apply(AppConfig {
            enable_theme: true,
            theme_css: Some("body{color:red}".into()),
            theme_path: Some("/x.css".into()),
            ..Default::default()
        });

        assert_eq!(
            runtime.styles().active(SheetId::Theme).as_deref(),
            Some("body{color:red}")
        );
    }

    #[tokio::test]
    async fn test_theme_resolver_failure_removes_sheet() {
        init_tracing();
        let (table, _) = bound_table();
        let runtime = Runtime::builder(table)
            .theme_resolver(Arc::new(BrokenTheme))
            .build();

        // Seed a stale theme, then apply a config whose file is unreadable.
        runtime.styles().upsert(SheetId::Theme, "stale {}");
        runtime.apply(AppConfig {
            enable_theme: true,
            theme_path: Some("/gone.css".into()),
            ..Default::default()
        });

        assert!(!runtime.status().theme_active);
    }

    #[tokio::test]
    async fn test_theme_disabled_removes_sheet_despite_sources() {
        let (table, _) = bound_table();
        let runtime = Runtime::new(table);

        runtime.apply(AppConfig {
            enable_theme: true,
            theme_css: Some("a{}".into()),
            ..Default::default()
        });
        assert!(runtime.status().theme_active);

        runtime.apply(AppConfig {
            enable_theme: false,
            theme_css: Some("a{}".into()),
            theme_path: Some("/x.css".into()),
            ..Default::default()
        });
        assert!(!runtime.status().theme_active);
    }

    #[tokio::test]
    async fn test_plugin_activates_once() {
        let (table, _) = bound_table();
        let loader = Arc::new(FlakyLoader {
            attempts: AtomicUsize::new(0),
            fail_first: 0,
        });
        let runtime = Runtime::builder(table).plugin_loader(loader.clone()).build();
        let cfg = AppConfig {
            enable_plugins: true,
            ..Default::default()
        };

        runtime.apply(cfg.clone());
        settle().await;
        runtime.apply(cfg.clone());
        runtime.apply(cfg);
        settle().await;

        assert!(runtime.status().plugin_loaded);
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plugin_failure_resets_flag_and_retries() {
        init_tracing();
        let (table, _) = bound_table();
        let loader = Arc::new(FlakyLoader {
            attempts: AtomicUsize::new(0),
            fail_first: 1,
        });
        let runtime = Runtime::builder(table).plugin_loader(loader.clone()).build();
        let cfg = AppConfig {
            enable_plugins: true,
            ..Default::default()
        };

        runtime.apply(cfg.clone());
        settle().await;
        assert!(!runtime.status().plugin_loaded);

        runtime.apply(cfg);
        settle().await;
        assert!(runtime.status().plugin_loaded);
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_plugins_disabled_never_activate() {
        let (table, _) = bound_table();
        let loader = Arc::new(FlakyLoader {
            attempts: AtomicUsize::new(0),
            fail_first: 0,
        });
        let runtime = Runtime::builder(table).plugin_loader(loader.clone()).build();

        runtime.apply(blockers_and_perf());
        settle().await;

        assert!(!runtime.status().plugin_loaded);
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 0);
    }
}
