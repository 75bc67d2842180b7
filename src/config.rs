//! Sandbox configuration, as passed to `createSandbox` from JavaScript.

use log::LevelFilter;
use serde::Deserialize;

use crate::isolation::IsolationKind;

pub const DEFAULT_SOURCE: &str = "sketch.js";
pub const DEFAULT_FALLBACK_SOURCE: &str = "script.js";
pub const DEFAULT_DEBOUNCE_MS: u32 = 250;

/// Every field is optional on the JavaScript side; keys are camelCase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Primary sketch location. Blank means [`DEFAULT_SOURCE`].
    pub source: Option<String>,
    /// Tried once when the primary location fails.
    pub fallback_source: String,
    /// Persist the last seed and iteration.
    pub cache: bool,
    pub isolation: IsolationKind,
    pub debounce_ms: u32,
    /// CSS selector of the element the stage is prepended to.
    pub mount: Option<String>,
    pub log_level: LevelFilter,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            source: None,
            fallback_source: DEFAULT_FALLBACK_SOURCE.to_string(),
            cache: true,
            isolation: IsolationKind::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            mount: None,
            log_level: LevelFilter::Info,
        }
    }
}

impl SandboxConfig {
    /// Where to fetch the sketch from first.
    pub fn primary_source(&self) -> &str {
        match self.source.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => DEFAULT_SOURCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_source_resolution() {
        let mut config = SandboxConfig::default();
        assert_eq!(config.primary_source(), "sketch.js");

        config.source = Some("   ".into());
        assert_eq!(config.primary_source(), "sketch.js");

        config.source = Some("  /art/sketch.js ".into());
        assert_eq!(config.primary_source(), "/art/sketch.js");
    }

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert!(config.cache);
        assert_eq!(config.isolation, IsolationKind::Inline);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.fallback_source, "script.js");
    }
}
