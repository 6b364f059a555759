//! Configuration structures for cfg-watch.
//!
//! - [`SourceConfig`] - which file to read and how to label its format
//! - [`WatchConfig`] - how filesystem events are turned into reloads
//! - [`Config`] - root configuration combining both
//!
//! All configuration types implement [`Default`] and deserialize with missing
//! fields filled from those defaults.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a file-backed configuration source.
///
/// # Examples
///
/// ```
/// use cw_core::SourceConfig;
///
/// let config = SourceConfig::default();
/// assert_eq!(config.path, "config.json");
/// assert_eq!(config.default_format, "json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path of the file to read and watch.
    pub path: Utf8PathBuf,

    /// Format reported when the file name carries no extension.
    pub default_format: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("config.json"),
            default_format: "json".to_owned(),
        }
    }
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use cw_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.settle_ms, 50);
/// assert!(config.watch_parent_on_loss);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Settle window in milliseconds.
    ///
    /// After a write event, further events arriving within this window are
    /// absorbed so one save produces one reload. `0` surfaces every write
    /// event as its own reload.
    pub settle_ms: u64,

    /// Whether to fall back to watching the parent directory when the watched
    /// file disappears through a rename or removal.
    ///
    /// With this disabled a file that is moved away and recreated is only
    /// picked up again if it already exists when the rename is processed.
    pub watch_parent_on_loss: bool,
}

impl WatchConfig {
    /// Returns a configuration that surfaces every write event verbatim.
    #[must_use]
    pub const fn passthrough() -> Self {
        Self {
            settle_ms: 0,
            watch_parent_on_loss: true,
        }
    }

    /// Returns the settle window as a [`Duration`](std::time::Duration).
    #[inline]
    #[must_use]
    pub const fn settle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settle_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            watch_parent_on_loss: true,
        }
    }
}

/// Root configuration for cfg-watch.
///
/// # Examples
///
/// ```
/// use cw_core::Config;
///
/// let config = Config::from_json_str(r#"{"source": {"path": "/etc/app/cfg.yaml"}}"#).unwrap();
/// assert_eq!(config.source.path, "/etc/app/cfg.yaml");
/// assert_eq!(config.watch.settle_ms, 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File source configuration.
    pub source: SourceConfig,

    /// File watcher configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a configuration file.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.as_str().is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "source.path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.source.path.file_name().is_none() {
            return Err(ConfigError::InvalidPath {
                path: self.source.path.clone(),
                reason: "does not name a file".to_owned(),
            });
        }

        if self.source.default_format.is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "source.default_format".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
