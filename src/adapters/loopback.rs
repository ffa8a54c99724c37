//! In-process stand-in for the remote setup/sync protocol.
//!
//! [`LoopbackRemote`] answers [`SyncCommand`]s the way a key-protection
//! service would, by publishing new state into a [`ProtocolState`]. It backs
//! the command-line binary and the end-to-end tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::ProtocolError;
use crate::protocol::{
    ChangePasscodeResult, HostState, ProtocolState, SetupState, SyncAction, SyncCommand,
    SyncErrorKind, SyncPasscodeState,
};
use crate::reactive::Tracked;
use crate::traits::CommandSink;

/// Simulated remote holding at most one stored passcode.
///
/// Replies are spawned on the reactive context and delivered on a later turn,
/// never from inside `send`, so each published step is seen by dependents on
/// its own.
///
/// # Example
///
/// ```ignore
/// let remote = LoopbackRemote::new(&protocol, None);
/// remote.connect();
/// let source = PasscodeKeySource::new(&protocol, Rc::new(remote.clone()));
/// ```
#[derive(Clone)]
pub struct LoopbackRemote {
    inner: Rc<Inner>,
}

struct Inner {
    protocol: ProtocolState,
    stored: RefCell<Option<String>>,
    connected: Cell<bool>,
    /// Changes to reject with a temporary failure before accepting one
    transient_change_failures: Cell<u32>,
}

impl LoopbackRemote {
    pub fn new(protocol: &ProtocolState, stored_passcode: Option<String>) -> Self {
        Self {
            inner: Rc::new(Inner {
                protocol: protocol.clone(),
                stored: RefCell::new(stored_passcode),
                connected: Cell::new(false),
                transient_change_failures: Cell::new(0),
            }),
        }
    }

    /// Bring the host up and ask for a passcode.
    pub fn connect(&self) {
        self.inner.connected.set(true);
        self.inner.protocol.host_state().set(HostState::Started);
        self.inner.require_sync();
    }

    /// Stop answering; later sends fail with `Disconnected`.
    pub fn disconnect(&self) {
        self.inner.connected.set(false);
        self.inner.protocol.host_state().set(HostState::Stopped);
    }

    /// Reject the next `count` passcode changes as temporary failures.
    pub fn fail_changes(&self, count: u32) {
        self.inner.transient_change_failures.set(count);
    }

    pub fn stored_passcode(&self) -> Option<String> {
        self.inner.stored.borrow().clone()
    }
}

impl Inner {
    fn require_sync(&self) {
        let state = if self.stored.borrow().is_some() {
            SyncPasscodeState::Existing
        } else {
            SyncPasscodeState::New
        };
        self.protocol
            .publish_setup(SetupState::SyncRequired, Tracked::present(state));
    }

    fn handle(&self, command: SyncCommand) {
        if !self.connected.get() {
            tracing::debug!(command = command.kind(), "loopback disconnected; dropping reply");
            return;
        }
        tracing::debug!(command = command.kind(), "loopback handling command");

        match command {
            SyncCommand::StartSync {
                action: SyncAction::New,
                passcode,
            } => {
                self.protocol.setup_state().set(SetupState::Ongoing);
                *self.stored.borrow_mut() = Some(passcode);
                self.complete();
            }
            SyncCommand::StartSync {
                action: SyncAction::Existing,
                passcode,
            } => {
                self.protocol.setup_state().set(SetupState::Ongoing);
                let matches = self.stored.borrow().as_deref() == Some(passcode.as_str());
                if matches {
                    self.complete();
                } else {
                    self.protocol
                        .report_sync_error(SyncErrorKind::IncorrectPasscode);
                    self.require_sync();
                }
            }
            SyncCommand::ChangePasscode { passcode } => {
                let remaining = self.transient_change_failures.get();
                if remaining > 0 {
                    self.transient_change_failures.set(remaining - 1);
                    self.protocol
                        .report_change_result(ChangePasscodeResult::TemporaryFailure);
                    return;
                }
                *self.stored.borrow_mut() = Some(passcode);
                self.protocol
                    .report_change_result(ChangePasscodeResult::Success);
            }
        }
    }

    fn complete(&self) {
        self.protocol.publish_setup(
            SetupState::Success,
            Tracked::present(SyncPasscodeState::None),
        );
    }
}

impl CommandSink for LoopbackRemote {
    fn send(&self, command: SyncCommand) -> Result<(), ProtocolError> {
        if !self.inner.connected.get() {
            return Err(ProtocolError::Disconnected);
        }
        let inner: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.protocol.context().spawn(async move {
            if let Some(inner) = inner.upgrade() {
                inner.handle(command);
            }
        });
        Ok(())
    }
}
