//! Key-source and key-protection error types.

use thiserror::Error;

/// Failures raised while bringing up or running a key source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySourceError {
    #[error("Key storage client could not be created: {message}")]
    StorageInit { message: String },

    #[error("Key protection manager failed to start: {message}")]
    ManagerStart { message: String },

    /// Reported asynchronously through a manager's failure listener.
    #[error("Key protection failure: {message}")]
    Protection { message: String },

    #[error("No key source installed")]
    NotInstalled,
}

impl KeySourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeySourceError::Protection { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            KeySourceError::StorageInit { .. } | KeySourceError::ManagerStart { .. } => {
                "Secure key storage could not be initialized.".to_string()
            }
            KeySourceError::Protection { .. } => {
                "Secure key storage reported a problem. Please try again.".to_string()
            }
            KeySourceError::NotInstalled => "Secure key storage is not configured.".to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            KeySourceError::StorageInit { .. } => "E_KEY_STORAGE_INIT",
            KeySourceError::ManagerStart { .. } => "E_KEY_MANAGER_START",
            KeySourceError::Protection { .. } => "E_KEY_PROTECTION",
            KeySourceError::NotInstalled => "E_KEY_NOT_INSTALLED",
        }
    }
}
