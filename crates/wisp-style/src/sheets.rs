//! Named Style Sheets
//!
//! Idempotent upsert/remove of the shell's injected style nodes. At most
//! one sheet exists per logical name; content is carried as literal text
//! and never parsed. A [`StyleSink`] mirrors registry changes into the
//! real document when the shell wires one in; without a sink the registry
//! is the document stand-in (which is what the tests use).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Logical names of the injectable sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetId {
    Performance,
    Theme,
}

impl SheetId {
    /// Stable element id used for the sheet's node in the document.
    pub fn element_id(&self) -> &'static str {
        match self {
            SheetId::Performance => "wisp-performance-css",
            SheetId::Theme => "wisp-theme-css",
        }
    }
}

/// Host hook that mirrors sheet changes into the actual document.
pub trait StyleSink: Send + Sync {
    /// Create or replace the node for `id` with `css` as its text.
    fn apply(&self, id: SheetId, css: &str);

    /// Drop the node for `id`.
    fn clear(&self, id: SheetId);
}

/// The sheet registry.
#[derive(Default)]
pub struct StyleInjector {
    sheets: Mutex<HashMap<SheetId, String>>,
    sink: Option<Arc<dyn StyleSink>>,
}

impl StyleInjector {
    /// Registry without a document hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry mirroring every change into `sink`.
    pub fn with_sink(sink: Arc<dyn StyleSink>) -> Self {
        Self {
            sheets: Mutex::new(HashMap::new()),
            sink: Some(sink),
        }
    }

    /// Insert or replace the sheet named `id`. Re-upserting identical
    /// content changes nothing and does not touch the sink.
    pub fn upsert(&self, id: SheetId, css: &str) {
        let mut sheets = self.sheets.lock().unwrap();
        if sheets.get(&id).is_some_and(|current| current.as_str() == css) {
            return;
        }
        sheets.insert(id, css.to_owned());
        debug!("style sheet set: {}", id.element_id());
        if let Some(sink) = &self.sink {
            sink.apply(id, css);
        }
    }

    /// Remove the sheet named `id`. No-op when absent.
    pub fn remove(&self, id: SheetId) {
        let mut sheets = self.sheets.lock().unwrap();
        if sheets.remove(&id).is_none() {
            return;
        }
        debug!("style sheet removed: {}", id.element_id());
        if let Some(sink) = &self.sink {
            sink.clear(id);
        }
    }

    /// The literal text currently held for `id`, if any.
    pub fn active(&self, id: SheetId) -> Option<String> {
        self.sheets.lock().unwrap().get(&id).cloned()
    }

    /// Whether a sheet named `id` currently exists.
    pub fn is_active(&self, id: SheetId) -> bool {
        self.sheets.lock().unwrap().contains_key(&id)
    }
}
