//! Built-in sheet content.

/// Performance-mode sheet: strips the animation, blur, and shadow work
/// that dominates paint time on low-memory machines.
pub const PERF_CSS: &str = r#"
*, *::before, *::after {
  animation: none !important;
  transition: none !important;
}

[style*="backdrop-filter"], [class*="backdrop"], [class*="blur"] {
  backdrop-filter: none !important;
  filter: none !important;
}

* {
  box-shadow: none !important;
  text-shadow: none !important;
}

img, video, canvas {
  will-change: auto !important;
}

[class*="avatar"] *, [class*="banner"] * {
  animation: none !important;
}
"#;
