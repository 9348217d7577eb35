//! Wisp Style Layer
//!
//! Named style-sheet injection for the shell's visual toggles: the fixed
//! performance-mode sheet and the user theme sheet. Operations are
//! idempotent so the orchestrator can re-apply a configuration without
//! duplicating nodes.

mod presets;
mod sheets;

pub use presets::PERF_CSS;
pub use sheets::{SheetId, StyleInjector, StyleSink};
