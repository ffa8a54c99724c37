//! Directory/identity provider error types.

use thiserror::Error;

/// Failures reported by a [`DirectoryProvider`](crate::traits::DirectoryProvider).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Directory unreachable: {message}")]
    Network { message: String },

    #[error("Directory rejected the auth token")]
    Unauthorized,

    #[error("Directory user not found: {id}")]
    NotFound { id: String },

    #[error("Malformed directory response: {message}")]
    Malformed { message: String },
}

impl DirectoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Network { .. })
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, DirectoryError::Unauthorized)
    }

    pub fn user_message(&self) -> String {
        match self {
            DirectoryError::Network { .. } => {
                "Could not reach the directory. Contacts will refresh on the next sync.".to_string()
            }
            DirectoryError::Unauthorized => {
                "Your directory session has expired. Please sign in again.".to_string()
            }
            DirectoryError::NotFound { id } => format!("No directory entry for {}.", id),
            DirectoryError::Malformed { .. } => {
                "The directory returned an unexpected response.".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::Network { .. } => "E_DIR_NETWORK",
            DirectoryError::Unauthorized => "E_DIR_UNAUTHORIZED",
            DirectoryError::NotFound { .. } => "E_DIR_NOT_FOUND",
            DirectoryError::Malformed { .. } => "E_DIR_MALFORMED",
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::Malformed {
            message: err.to_string(),
        }
    }
}
