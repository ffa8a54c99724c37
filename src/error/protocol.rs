//! Remote sync protocol and reactive engine error types.

use thiserror::Error;

/// Failures sending commands to the remote setup/sync protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Failed to send {command}: {message}")]
    SendFailed {
        command: &'static str,
        message: String,
    },

    #[error("Remote protocol disconnected")]
    Disconnected,
}

impl ProtocolError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::SendFailed { .. } => "E_PROTO_SEND",
            ProtocolError::Disconnected => "E_PROTO_DISCONNECTED",
        }
    }
}

/// Misuse of the monitor graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A monitor body tried to run while its previous run was still on the stack.
    #[error("Monitor '{monitor}' re-entered its own run")]
    ReentrantRun { monitor: String },

    #[error("Reactive context for monitor '{monitor}' was dropped")]
    ContextDropped { monitor: String },
}

impl ReactiveError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ReactiveError::ReentrantRun { .. } => "E_REACTIVE_REENTRANT",
            ReactiveError::ContextDropped { .. } => "E_REACTIVE_CONTEXT",
        }
    }
}
