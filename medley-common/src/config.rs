//! Console configuration loading
//!
//! All tunables for the editor and list subsystems live in one TOML-backed
//! struct so tests and hosts can override individual knobs without touching
//! the rest. Resolution follows the usual priority order: explicit path
//! argument, then environment variable, then compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the console config file
pub const CONFIG_ENV_VAR: &str = "MEDLEY_CONFIG";

/// Console-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the remote media service RPC endpoint
    pub service_url: String,
    /// Total request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Debounce window for section aggregate recomputation (milliseconds)
    pub aggregate_debounce_ms: u64,
    /// Debounce window for the editor dirty flag / navigation guard (milliseconds)
    pub dirty_debounce_ms: u64,
    /// Maximum number of operations per chunk in bulk multi-requests
    pub bulk_chunk_size: usize,
    /// Default page size for list views (overridden by per-view preference)
    pub default_page_size: i64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8080/api_v3".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            aggregate_debounce_ms: 100,
            dirty_debounce_ms: 500,
            bulk_chunk_size: 50,
            default_page_size: 50,
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: ConsoleConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration following priority order:
    /// 1. Explicit path argument (highest priority)
    /// 2. `MEDLEY_CONFIG` environment variable
    /// 3. Compiled defaults (fallback)
    pub fn resolve(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(&PathBuf::from(path));
        }
        Ok(Self::default())
    }

    /// Validate tunables that would break coordination invariants if zeroed
    fn validate(&self) -> Result<()> {
        if self.bulk_chunk_size == 0 {
            return Err(Error::Config("bulk_chunk_size must be at least 1".to_string()));
        }
        if self.default_page_size <= 0 {
            return Err(Error::Config("default_page_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.dirty_debounce_ms, 500);
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.bulk_chunk_size, 50);
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service_url = \"https://media.example.com/api_v3\"").unwrap();
        writeln!(file, "bulk_chunk_size = 25").unwrap();

        let config = ConsoleConfig::load(file.path()).unwrap();
        assert_eq!(config.service_url, "https://media.example.com/api_v3");
        assert_eq!(config.bulk_chunk_size, 25);
        // Unspecified keys fall back to defaults
        assert_eq!(config.dirty_debounce_ms, 500);
    }

    #[test]
    fn test_invalid_chunk_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bulk_chunk_size = 0").unwrap();

        let result = ConsoleConfig::load(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ConsoleConfig::load(Path::new("/nonexistent/medley.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
