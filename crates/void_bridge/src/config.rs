//! Bridge configuration
//!
//! Loaded from TOML, then overridden by environment variables.
//!
//! ```toml
//! [module]
//! search_paths = ["scripts"]
//! native_search_paths = ["scripts/native"]
//! shadow_copy = true
//!
//! [hot_reload]
//! enabled = true
//! debounce_ms = 500
//! preserve_state = true
//!
//! [diagnostics]
//! trace_lifecycle = false
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where script modules and their native dependencies are looked up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Directories searched when a module is loaded by bare name
    pub search_paths: Vec<PathBuf>,
    /// Directories searched for native libraries a module depends on
    pub native_search_paths: Vec<PathBuf>,
    /// Load a private copy of the module file so a rebuild can replace it
    pub shadow_copy: bool,
    /// Directory for shadow copies (defaults to the system temp directory)
    pub shadow_dir: Option<PathBuf>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
            native_search_paths: Vec::new(),
            shadow_copy: true,
            shadow_dir: None,
        }
    }
}

/// Configuration for hot-reload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadConfig {
    /// Watch the active module file for changes
    pub enabled: bool,
    /// Wait for file changes to settle, in milliseconds
    pub debounce_ms: u64,
    /// Carry script state across reloads
    pub preserve_state: bool,
}

impl HotReloadConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
            preserve_state: true,
        }
    }
}

/// Logging knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log every start/update/stop dispatch at debug level
    pub trace_lifecycle: bool,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub module: ModuleConfig,
    pub hot_reload: HotReloadConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl BridgeConfig {
    /// Parse from a TOML string
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded bridge config from {}", path.display());
        Ok(config)
    }

    /// Load from a file if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `VOID_BRIDGE_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(paths) = std::env::var("VOID_BRIDGE_SEARCH_PATH") {
            let extra: Vec<PathBuf> = std::env::split_paths(&paths).collect();
            if !extra.is_empty() {
                log::info!("Module search paths from env: {:?}", extra);
                self.module.search_paths.splice(0..0, extra);
            }
        }

        if let Ok(paths) = std::env::var("VOID_BRIDGE_NATIVE_PATH") {
            self.module
                .native_search_paths
                .extend(std::env::split_paths(&paths));
        }

        if let Ok(value) = std::env::var("VOID_BRIDGE_HOT_RELOAD") {
            if let Some(enabled) = parse_flag(&value) {
                self.hot_reload.enabled = enabled;
            }
        }

        if let Ok(value) = std::env::var("VOID_BRIDGE_TRACE") {
            if let Some(enabled) = parse_flag(&value) {
                self.diagnostics.trace_lifecycle = enabled;
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.hot_reload.enabled);
        assert!(config.hot_reload.preserve_state);
        assert_eq!(config.hot_reload.debounce(), Duration::from_millis(500));
        assert_eq!(config.module.search_paths, vec![PathBuf::from(".")]);
        assert!(!config.diagnostics.trace_lifecycle);
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
            [module]
            search_paths = ["scripts", "mods"]
            shadow_copy = false

            [hot_reload]
            debounce_ms = 250
        "#;

        let config = BridgeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.module.search_paths.len(), 2);
        assert!(!config.module.shadow_copy);
        assert!(config.module.native_search_paths.is_empty());
        assert_eq!(config.hot_reload.debounce_ms, 250);
        assert!(config.hot_reload.enabled);
    }

    #[test]
    fn test_invalid_toml() {
        let err = BridgeConfig::from_toml_str("[module\nsearch_paths = 3").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "[diagnostics]\ntrace_lifecycle = true\n").unwrap();

        let config = BridgeConfig::load_from_file(&path).unwrap();
        assert!(config.diagnostics.trace_lifecycle);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
