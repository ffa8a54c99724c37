//! Session configuration.
//!
//! Loaded from `<config dir>/keysync/config.json`. Every field has a
//! default, so a missing file or a partial one is fine.
//!
//! # Example
//!
//! ```ignore
//! use keysync::config::SessionConfig;
//!
//! let config = SessionConfig::default()
//!     .with_directory_page_size(50)
//!     .with_force_refresh_lookups(true);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keysource::KeySourceKind;

/// Default number of users requested per directory page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default tracing filter when `KEYSYNC_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "keysync=info";

/// Environment variable that overrides [`SessionConfig::log_filter`].
pub const LOG_ENV_VAR: &str = "KEYSYNC_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Users per `fetch_all_users` page
    pub directory_page_size: usize,
    /// Bypass resolver caches on every lookup
    pub force_refresh_lookups: bool,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Provider installed when the session starts
    pub key_source: KeySourceKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            directory_page_size: DEFAULT_PAGE_SIZE,
            force_refresh_lookups: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            key_source: KeySourceKind::Challenge,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory_page_size(mut self, size: usize) -> Self {
        self.directory_page_size = size;
        self
    }

    pub fn with_force_refresh_lookups(mut self, force: bool) -> Self {
        self.force_refresh_lookups = force;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_key_source(mut self, kind: KeySourceKind) -> Self {
        self.key_source = kind;
        self
    }

    /// `<config dir>/keysync/config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("keysync").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Read and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `KEYSYNC_LOG` if set and non-empty, otherwise the configured filter.
    pub fn effective_log_filter(&self) -> String {
        match std::env::var(LOG_ENV_VAR) {
            Ok(filter) if !filter.trim().is_empty() => filter,
            _ => self.log_filter.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "directory_page_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_filter",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
