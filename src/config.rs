//! Configuration file parser for ~/.config/nitroless/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::repo::FetchOptions;
use crate::store::StoreOptions;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Where lists are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Newline-delimited text files, readable by the keyboard extension
    Files,
    /// Embedded SQLite database (`lists.db`)
    Sqlite,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared data directory. `None` = `~/.local/share/nitroless`.
    pub data_dir: Option<PathBuf>,

    pub backend: Backend,

    /// Per-manifest request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Manifest responses larger than this are rejected.
    pub max_manifest_bytes: usize,

    /// Reject repository URLs pointing at localhost or private networks.
    pub block_private_hosts: bool,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: Backend::Files,
            request_timeout_secs: 60,
            max_manifest_bytes: 5 * 1024 * 1024,
            block_private_hosts: false,
            user_agent: concat!("nitroless/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "data_dir",
                "backend",
                "request_timeout_secs",
                "max_manifest_bytes",
                "block_private_hosts",
                "user_agent",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), backend = ?config.backend, "Loaded configuration");
        Ok(config)
    }

    /// Store behaviour derived from this config.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            fetch: FetchOptions {
                timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
                max_bytes: self.max_manifest_bytes,
            },
            block_private_hosts: self.block_private_hosts,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.data_dir.is_none());
        assert_eq!(config.backend, Backend::Files);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.max_manifest_bytes, 5 * 1024 * 1024);
        assert!(!config.block_private_hosts);
        assert!(config.user_agent.starts_with("nitroless/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.backend, Backend::Files);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (_dir, path) = write_config("");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("backend = \"sqlite\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
data_dir = "/srv/nitroless"
backend = "files"
request_timeout_secs = 15
max_manifest_bytes = 65536
block_private_hosts = true
user_agent = "custom/1.0"
"#,
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/nitroless")));
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.max_manifest_bytes, 65536);
        assert!(config.block_private_hosts);
        assert_eq!(config.user_agent, "custom/1.0");

        let options = config.store_options();
        assert_eq!(options.fetch.timeout, Duration::from_secs(15));
        assert_eq!(options.fetch.max_bytes, 65536);
        assert!(options.block_private_hosts);
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.store_options().fetch.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let (_dir, path) = write_config("backend = \"cloud\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("backend = \"files\"\ntotally_fake_key = 42\n");
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }
}
