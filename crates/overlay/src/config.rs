//! Overlay configuration.
//!
//! Configuration is passed explicitly through [`Overlay`](crate::element::Overlay);
//! there is no process-wide state.

use crate::error::{OverlayError, OverlayResult};
use serde::Deserialize;
use std::path::Path;

/// Default limit for sentinel scans, in items (arrays) or bytes (strings).
pub const DEFAULT_MAX_SCAN: usize = 1 << 20;

/// Value-only or type-annotated rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprStyle {
    #[default]
    Simple,
    Rich,
}

/// Single-line or indented multi-line rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprLayout {
    Compact,
    #[default]
    Indented,
}

/// Options for [`render`](crate::repr::render).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReprOptions {
    pub style: ReprStyle,
    pub layout: ReprLayout,
    /// Render a dereferenced pointer as its target, without a leading `*`.
    pub hide_pointers: bool,
    /// Spaces per nesting level in indented layout.
    pub indent: usize,
}

const DEFAULT_REPR: ReprOptions = ReprOptions {
    style: ReprStyle::Simple,
    layout: ReprLayout::Indented,
    hide_pointers: true,
    indent: 4,
};

impl Default for ReprOptions {
    fn default() -> Self {
        DEFAULT_REPR
    }
}

impl ReprOptions {
    /// Single-line, value-only rendering.
    pub fn compact() -> Self {
        ReprOptions {
            layout: ReprLayout::Compact,
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: ReprStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_layout(mut self, layout: ReprLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_hide_pointers(mut self, hide: bool) -> Self {
        self.hide_pointers = hide;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub repr: ReprOptions,
    /// Upper bound for null-terminated scans.
    pub max_scan: usize,
}

/// Used by overlays created without an explicit configuration.
pub static DEFAULT_CONFIG: OverlayConfig = OverlayConfig {
    repr: DEFAULT_REPR,
    max_scan: DEFAULT_MAX_SCAN,
};

impl Default for OverlayConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

impl OverlayConfig {
    pub fn from_json_str(json: &str) -> OverlayResult<Self> {
        serde_json::from_str(json).map_err(|e| OverlayError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_max_scan(mut self, max_scan: usize) -> Self {
        self.max_scan = max_scan;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.max_scan, DEFAULT_MAX_SCAN);
        assert_eq!(config.repr.style, ReprStyle::Simple);
        assert_eq!(config.repr.layout, ReprLayout::Indented);
        assert!(config.repr.hide_pointers);
    }

    #[test]
    fn test_partial_json() {
        let config =
            OverlayConfig::from_json_str(r#"{ "repr": { "style": "rich" }, "max_scan": 64 }"#)
                .unwrap();
        assert_eq!(config.repr.style, ReprStyle::Rich);
        assert_eq!(config.repr.layout, ReprLayout::Indented);
        assert_eq!(config.repr.indent, 4);
        assert_eq!(config.max_scan, 64);
    }

    #[test]
    fn test_bad_json() {
        let err = OverlayConfig::from_json_str(r#"{ "repr": { "style": "loud" } }"#).unwrap_err();
        assert!(matches!(err, OverlayError::Config(_)));
        assert!(err.to_string().starts_with("Config error: "));
    }
}
