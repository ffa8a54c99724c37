//! Recording doubles for the sync protocol and passcode prompts.

use std::cell::RefCell;

use crate::error::ProtocolError;
use crate::keysource::PasscodeError;
use crate::protocol::SyncCommand;
use crate::traits::{CommandSink, PasscodeProvider};

/// [`CommandSink`] that records every command it accepts.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: RefCell<Vec<SyncCommand>>,
    fail_next: RefCell<Option<ProtocolError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands accepted so far, oldest first.
    pub fn commands(&self) -> Vec<SyncCommand> {
        self.commands.borrow().clone()
    }

    /// Reject the next command with `error`.
    pub fn fail_next(&self, error: ProtocolError) {
        *self.fail_next.borrow_mut() = Some(error);
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, command: SyncCommand) -> Result<(), ProtocolError> {
        if let Some(error) = self.fail_next.borrow_mut().take() {
            return Err(error);
        }
        self.commands.borrow_mut().push(command);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    New,
    Existing,
}

/// One recorded prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasscodePrompt {
    pub kind: PromptKind,
    pub force_reentry: bool,
    pub prior_error: PasscodeError,
}

/// [`PasscodeProvider`] that records prompts instead of asking anyone.
#[derive(Debug, Default)]
pub struct RecordingPasscodeProvider {
    prompts: RefCell<Vec<PasscodePrompt>>,
}

impl RecordingPasscodeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<PasscodePrompt> {
        self.prompts.borrow().clone()
    }

    pub fn last(&self) -> Option<PasscodePrompt> {
        self.prompts.borrow().last().copied()
    }

    fn record(&self, kind: PromptKind, force_reentry: bool, prior_error: PasscodeError) {
        self.prompts.borrow_mut().push(PasscodePrompt {
            kind,
            force_reentry,
            prior_error,
        });
    }
}

impl PasscodeProvider for RecordingPasscodeProvider {
    fn request_new_passcode(&self, force_reentry: bool, prior_error: PasscodeError) {
        self.record(PromptKind::New, force_reentry, prior_error);
    }

    fn provide_existing_passcode(&self, force_reentry: bool, prior_error: PasscodeError) {
        self.record(PromptKind::Existing, force_reentry, prior_error);
    }
}
