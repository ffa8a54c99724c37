//! Configuration loading error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "E_CONFIG_READ",
            ConfigError::Parse(_) => "E_CONFIG_PARSE",
            ConfigError::InvalidValue { .. } => "E_CONFIG_VALUE",
            ConfigError::NoConfigDir => "E_CONFIG_NO_DIR",
        }
    }
}
