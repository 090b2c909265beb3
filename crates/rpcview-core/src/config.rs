//! RON configuration for rpcview hosts.
//!
//! Loaded from `~/.config/rpcview/config.ron` (platform config dir). Every
//! field is optional; a missing file means defaults.
//!
//! ```ron
//! (
//!     serialization: (pretty: true),
//!     pacing: (write_interval_ms: 200),
//!     metadata: {"testkey": "testvalue"},
//! )
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rpcview_rpc::Metadata;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec::SerializerOptions;
use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_WRITE_INTERVAL};
use crate::error::ConfigError;
use crate::invoke::Pacing;

/// Outbound stream pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between consecutive request-stream writes, in milliseconds.
    pub write_interval_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            write_interval_ms: DEFAULT_WRITE_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcViewConfig {
    pub serialization: SerializerOptions,
    pub pacing: PacingConfig,
    /// Entries attached to every call when the host registers no provider
    /// of its own.
    pub metadata: BTreeMap<String, String>,
}

impl RpcViewConfig {
    /// Default config file location, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Load from [`RpcViewConfig::default_path`], falling back to defaults
    /// when the file is absent or unreadable.
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            info!("No config directory available, using default config");
            return Self::default();
        };
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            write_interval: Duration::from_millis(self.pacing.write_interval_ms),
        }
    }

    pub fn metadata(&self) -> Metadata {
        self.metadata.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RpcViewConfig::default();
        assert!(config.serialization.pretty);
        assert_eq!(config.pacing(), Pacing::default());
        assert!(config.metadata().is_empty());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = RpcViewConfig::from_ron_str("(pacing: (write_interval_ms: 5))").unwrap();
        assert_eq!(config.pacing().write_interval, Duration::from_millis(5));
        assert!(config.serialization.pretty);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(serialization: (pretty: false), metadata: {{"TestKey": "testvalue"}})"#
        )
        .unwrap();
        let config = RpcViewConfig::load(file.path()).unwrap();
        assert!(!config.serialization.pretty);
        assert_eq!(config.metadata().get("testkey"), Some("testvalue"));
    }

    #[test]
    fn test_bad_ron_is_an_error() {
        let err = RpcViewConfig::from_ron_str("(pacing: ").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RpcViewConfig::load(&dir.path().join("nope.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
