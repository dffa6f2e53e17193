#![forbid(unsafe_code)]

//! Structured logging on `tracing`. Output always goes to stderr so command
//! output on stdout stays machine-readable.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ConfigError;

/// Overrides `logging.level` with a full filter directive, e.g. `rd_storage=debug,info`.
pub const LOG_ENV: &str = "REVDEX_LOG";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error or off.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                field: "logging.level",
                message: format!("unknown level {:?}", self.level),
            })
        }
    }
}

/// `REVDEX_LOG` wins over the configured level.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(directive) = std::env::var(LOG_ENV) {
        if !directive.trim().is_empty() {
            return EnvFilter::try_new(&directive).map_err(|err| ConfigError::Invalid {
                field: LOG_ENV,
                message: err.to_string(),
            });
        }
    }
    config.validate()?;
    EnvFilter::try_new(config.level.to_ascii_lowercase()).map_err(|err| ConfigError::Invalid {
        field: "logging.level",
        message: err.to_string(),
    })
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_env_filter(config)?;
    let base = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("logging already initialised");
    }
    Ok(())
}
