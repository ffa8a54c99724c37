//! Passcode prompts delivered over a channel.
//!
//! The state machine calls its [`PasscodeProvider`] from inside a monitor
//! run, where nothing may block. [`ChannelPasscodeProvider`] turns each call
//! into a [`PromptRequest`] that a UI task reads at its own pace.

use tokio::sync::mpsc;

use crate::keysource::PasscodeError;
use crate::traits::PasscodeProvider;

/// Which passcode the user is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRequest {
    New {
        force_reentry: bool,
        prior_error: PasscodeError,
    },
    Existing {
        force_reentry: bool,
        prior_error: PasscodeError,
    },
}

impl PromptRequest {
    pub fn prior_error(&self) -> PasscodeError {
        match self {
            PromptRequest::New { prior_error, .. } | PromptRequest::Existing { prior_error, .. } => {
                *prior_error
            }
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, PromptRequest::New { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelPasscodeProvider {
    tx: mpsc::UnboundedSender<PromptRequest>,
}

impl ChannelPasscodeProvider {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromptRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn deliver(&self, request: PromptRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!("passcode prompt dropped; receiver closed");
        }
    }
}

impl PasscodeProvider for ChannelPasscodeProvider {
    fn request_new_passcode(&self, force_reentry: bool, prior_error: PasscodeError) {
        self.deliver(PromptRequest::New {
            force_reentry,
            prior_error,
        });
    }

    fn provide_existing_passcode(&self, force_reentry: bool, prior_error: PasscodeError) {
        self.deliver(PromptRequest::Existing {
            force_reentry,
            prior_error,
        });
    }
}
