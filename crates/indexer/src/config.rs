#![forbid(unsafe_code)]

//! Indexer configuration: defaults, then a TOML file, then `REVDEX_*`
//! environment variables. Command-line flags are applied last by the binary.

use std::path::{Path, PathBuf};

use rd_storage::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

pub const DEFAULT_STORAGE_DIR: &str = ".revdex";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// Directory holding `revdex.db`.
    pub storage_dir: PathBuf,
    /// Rows buffered per writer before a flush.
    pub batch_size: usize,
    /// Attempts after the first for a revision that failed on store I/O.
    pub max_retries: u32,
    pub logging: LoggingConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            logging: LoggingConfig::default(),
        }
    }
}

impl IndexerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `REVDEX_STORAGE_DIR`, `REVDEX_BATCH_SIZE` and `REVDEX_MAX_RETRIES`.
    /// `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("REVDEX_STORAGE_DIR") {
            if !dir.is_empty() {
                self.storage_dir = PathBuf::from(dir);
            }
        }
        if let Some(raw) = lookup("REVDEX_BATCH_SIZE") {
            self.batch_size = parse_number("REVDEX_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("REVDEX_MAX_RETRIES") {
            self.max_retries = parse_number("REVDEX_MAX_RETRIES", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage_dir",
                message: "must not be empty".to_string(),
            });
        }
        self.logging.validate()
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        message: format!("expected a non-negative integer, got {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let config = IndexerConfig::from_toml_str("").unwrap();
        assert_eq!(config, IndexerConfig::default());
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.storage_dir, PathBuf::from(".revdex"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = IndexerConfig::from_toml_str(
            r#"
            storage_dir = "/var/lib/revdex"
            batch_size = 250

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/revdex"));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            IndexerConfig::from_toml_str("batchsize = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("REVDEX_STORAGE_DIR", "/tmp/idx"),
            ("REVDEX_BATCH_SIZE", " 42 "),
        ]
        .into_iter()
        .collect();
        let mut config = IndexerConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.batch_size, 42);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);

        let err = config
            .apply_env(|key| (key == "REVDEX_MAX_RETRIES").then(|| "-1".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "REVDEX_MAX_RETRIES",
                ..
            }
        ));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let config = IndexerConfig {
            batch_size: 0,
            ..IndexerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = IndexerConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
