//! Error context for enriched error information.

use chrono::{DateTime, Utc};

/// Context information attached to errors for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Human-readable description of the operation that failed.
    pub operation: String,

    /// Remote identity the operation was about, if any.
    pub remote_id: Option<String>,

    /// Timestamp when the error occurred.
    pub timestamp: DateTime<Utc>,

    /// Optional component/module where the error originated.
    pub component: Option<String>,

    /// Session the error belongs to.
    pub session_id: Option<String>,
}

impl ErrorContext {
    /// Create a new ErrorContext for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            remote_id: None,
            timestamp: Utc::now(),
            component: None,
            session_id: None,
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![format!("operation={}", self.operation)];

        if let Some(ref remote_id) = self.remote_id {
            parts.push(format!("remote_id={}", remote_id));
        }
        if let Some(ref component) = self.component {
            parts.push(format!("component={}", component));
        }
        if let Some(ref session_id) = self.session_id {
            parts.push(format!("session_id={}", session_id));
        }
        parts.push(format!("timestamp={}", self.timestamp.to_rfc3339()));

        parts.join(" ")
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.operation)?;

        if let Some(ref remote_id) = self.remote_id {
            write!(f, " remote={}", remote_id)?;
        }

        Ok(())
    }
}
