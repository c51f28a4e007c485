//! CLI configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, and environment variables. `--db` on the command line wins over
//! all of them.
//!
//! ```toml
//! [storage]
//! path = "/var/lib/tollgate/tollgate.redb"
//!
//! [constraints]
//! default_strategy = "ASAP"
//! ```

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use snafu::Snafu;
use tollgate_core::Strategy;

/// Environment variable overriding `storage.path`.
pub const DB_PATH_ENV: &str = "TOLLGATE_DB_PATH";

mod defaults {
    use std::path::PathBuf;

    pub fn storage_path() -> PathBuf { "./data/tollgate.redb".into() }
    pub fn default_strategy() -> String { "FIFO".to_string() }
}

/// Configuration errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid configuration for {key}: '{value}' ({reason})"))]
    InvalidValue {
        /// Dotted key of the offending value.
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration file could not be read.
    #[snafu(display("failed to read config file {}: {source}", path.display()))]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[snafu(display("failed to parse config file {}: {source}", path.display()))]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the redb database file.
    #[serde(default = "defaults::storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: defaults::storage_path(),
        }
    }
}

/// Defaults applied when creating constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintsConfig {
    /// Strategy used when `constraint create` is given no `--strategy`.
    #[serde(default = "defaults::default_strategy")]
    pub default_strategy: String,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            default_strategy: defaults::default_strategy(),
        }
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TollgateConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub constraints: ConstraintsConfig,
}

impl TollgateConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.override_storage_path(std::env::var_os(DB_PATH_ENV).map(PathBuf::from));
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        toml::from_str(&contents).context(ParseSnafu { path })
    }

    /// Replace `storage.path` if an override is present.
    pub fn override_storage_path(&mut self, path: Option<PathBuf>) {
        if let Some(path) = path {
            self.storage.path = path;
        }
    }

    /// The strategy for constraints created without an explicit one.
    pub fn default_strategy(&self) -> Result<Strategy, ConfigError> {
        self.constraints.default_strategy.parse().map_err(|reason| ConfigError::InvalidValue {
            key: "constraints.default_strategy".to_string(),
            value: self.constraints.default_strategy.clone(),
            reason,
        })
    }

    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.path".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        self.default_strategy()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::default();
        assert_eq!(config.storage.path, PathBuf::from("./data/tollgate.redb"));
        assert_eq!(config.default_strategy().unwrap(), Strategy::Fifo);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tollgate.toml");
        std::fs::write(&path, "[constraints]\ndefault_strategy = \"asap\"\n").unwrap();

        let config = TollgateConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("./data/tollgate.redb"));
        assert_eq!(config.default_strategy().unwrap(), Strategy::Asap);
    }

    #[test]
    fn test_unknown_strategy_is_invalid() {
        let mut config = TollgateConfig::default();
        config.constraints.default_strategy = "LIFO".to_string();
        match config.validate() {
            Err(ConfigError::InvalidValue { key, value, .. }) => {
                assert_eq!(key, "constraints.default_strategy");
                assert_eq!(value, "LIFO");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_storage_path_is_invalid() {
        let mut config = TollgateConfig::default();
        config.override_storage_path(Some(PathBuf::new()));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_storage_override() {
        let mut config = TollgateConfig::default();
        config.override_storage_path(None);
        assert_eq!(config.storage.path, PathBuf::from("./data/tollgate.redb"));
        config.override_storage_path(Some("/srv/t.redb".into()));
        assert_eq!(config.storage.path, PathBuf::from("/srv/t.redb"));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(TollgateConfig::from_file(&missing), Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[storage]\npath = 42\n").unwrap();
        assert!(matches!(TollgateConfig::from_file(&bad), Err(ConfigError::Parse { .. })));
    }
}
