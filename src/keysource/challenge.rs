//! Challenge-backed key source: the passcode state machine.
//!
//! There is no explicit state enum. What to do next is derived on every
//! change from the remote setup state, the remote passcode state and the
//! last classified sync error:
//!
//! | Setup state | Passcode state | Action |
//! |---|---|---|
//! | Unknown | - | nothing (not loaded) |
//! | SyncRequired | New | `request_new_passcode(false, last_error)` |
//! | SyncRequired | Existing | `provide_existing_passcode(false, last_error)` |
//! | SyncRequired | Unknown / None / Unspecified | nothing |
//! | Ongoing | - | reset last error to None |
//! | anything else | - | nothing |
//!
//! A second monitor classifies remote sync errors into [`PasscodeError`].
//! It never prompts; only the passcode monitor does.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{KeySource, KeySourceKind, PasscodeError};
use crate::error::KeySyncResult;
use crate::protocol::{
    ChangePasscodeResult, ProtocolState, SetupState, SyncAction, SyncCommand, SyncErrorKind,
    SyncPasscodeState,
};
use crate::reactive::{Monitor, Observable, OneShotMonitor, ReactiveContext};
use crate::traits::{CommandSink, PasscodeProvider};

/// Passcode-gated key source driving the remote setup/sync protocol.
///
/// Cloning shares the same state machine.
#[derive(Clone)]
pub struct PasscodeKeySource {
    inner: Rc<Inner>,
}

struct Inner {
    ctx: ReactiveContext,
    protocol: ProtocolState,
    sink: Rc<dyn CommandSink>,
    provider: Observable<Option<Rc<dyn PasscodeProvider>>>,
    last_error: Cell<PasscodeError>,
    /// Version of the sync-error observable behind `last_error`.
    classified_version: Cell<u64>,
    forgot: Cell<bool>,
    passcode_monitor: RefCell<Option<Monitor>>,
    error_monitor: RefCell<Option<Monitor>>,
    pending_set: RefCell<Option<OneShotMonitor>>,
    pending_change: RefCell<Option<OneShotMonitor>>,
}

impl PasscodeKeySource {
    pub fn new(protocol: &ProtocolState, sink: Rc<dyn CommandSink>) -> Self {
        let ctx = protocol.context().clone();
        Self {
            inner: Rc::new(Inner {
                provider: Observable::new(&ctx, None),
                ctx,
                protocol: protocol.clone(),
                sink,
                last_error: Cell::new(PasscodeError::None),
                classified_version: Cell::new(0),
                forgot: Cell::new(false),
                passcode_monitor: RefCell::new(None),
                error_monitor: RefCell::new(None),
                pending_set: RefCell::new(None),
                pending_change: RefCell::new(None),
            }),
        }
    }

    /// Register (or remove) the collaborator that prompts the user.
    ///
    /// Registering while a prompt is due shows it right away.
    pub fn set_passcode_provider(&self, provider: Option<Rc<dyn PasscodeProvider>>) {
        self.inner.provider.update(|slot| *slot = provider);
    }

    /// The error that will accompany the next prompt.
    pub fn last_error(&self) -> PasscodeError {
        self.inner.last_error.get()
    }

    pub fn is_started(&self) -> bool {
        self.inner.passcode_monitor.borrow().is_some()
    }

    /// Forward a passcode entered by the user.
    ///
    /// Waits until the remote passcode state is known, then sends exactly
    /// one command for it. A call made while an earlier one is still
    /// waiting replaces it. Errors from an immediate send are returned;
    /// a failed send stays pending and is retried on the next change of the
    /// passcode or host state.
    pub fn set_passcode(&self, passcode: impl Into<String>) -> KeySyncResult<()> {
        let passcode = passcode.into();
        let forgot = self.inner.forgot.replace(false);

        if let Some(previous) = self.inner.pending_set.borrow_mut().take() {
            previous.dispose();
        }

        let weak = Rc::downgrade(&self.inner);
        let one_shot = OneShotMonitor::try_new(&self.inner.ctx, "set-passcode", move || {
            let Some(inner) = weak.upgrade() else {
                return Ok(true);
            };
            // Subscribed so a reconnect retries a send that failed.
            let _host = inner.protocol.host_state().get();
            let reported = inner.protocol.passcode_state().get();
            let Some(state) = reported.get().copied() else {
                return Ok(false);
            };
            let state = if forgot {
                SyncPasscodeState::New
            } else {
                state
            };
            Inner::dispatch_passcode(&inner, state, &passcode)?;
            Ok(true)
        });

        *self.inner.pending_set.borrow_mut() = Some(one_shot.clone());
        one_shot.activate()
    }
}

impl Inner {
    fn provider(&self) -> Option<Rc<dyn PasscodeProvider>> {
        self.provider.peek()
    }

    fn on_passcode_state(&self) {
        match self.protocol.setup_state().get() {
            SetupState::Unknown => {}
            SetupState::SyncRequired => {
                let reported = self.protocol.passcode_state().get();
                let provider = self.provider.get();
                let Some(state) = reported.get().copied() else {
                    return;
                };
                let Some(provider) = provider else {
                    tracing::debug!(?state, "passcode needed but no provider registered");
                    return;
                };
                // The error monitor may be queued behind this one when both
                // observables changed in the same batch.
                self.classify_unseen_error();
                let prior_error = self.last_error.get();
                match state {
                    SyncPasscodeState::New => {
                        tracing::debug!(?prior_error, "requesting new passcode");
                        provider.request_new_passcode(false, prior_error);
                    }
                    SyncPasscodeState::Existing => {
                        tracing::debug!(?prior_error, "requesting existing passcode");
                        provider.provide_existing_passcode(false, prior_error);
                    }
                    SyncPasscodeState::None | SyncPasscodeState::Unspecified => {}
                }
            }
            SetupState::Ongoing => self.last_error.set(PasscodeError::None),
            // A stale error survives Success/Failure.
            SetupState::Success | SetupState::Failure => {}
        }
    }

    fn on_sync_error(&self) {
        let errors = self.protocol.sync_error();
        self.classify(errors.get(), errors.version());
    }

    fn classify_unseen_error(&self) {
        let errors = self.protocol.sync_error();
        let version = errors.version();
        if version > self.classified_version.get() {
            self.classify(errors.peek(), version);
        }
    }

    fn classify(&self, kind: SyncErrorKind, version: u64) {
        if version == self.classified_version.get() && version != 0 {
            return;
        }
        self.classified_version.set(version);
        self.last_error.set(PasscodeError::from(kind));
    }

    fn dispatch_passcode(
        this: &Rc<Inner>,
        state: SyncPasscodeState,
        passcode: &str,
    ) -> KeySyncResult<()> {
        let command = match state {
            SyncPasscodeState::New => SyncCommand::StartSync {
                action: SyncAction::New,
                passcode: passcode.to_string(),
            },
            SyncPasscodeState::Existing => SyncCommand::StartSync {
                action: SyncAction::Existing,
                passcode: passcode.to_string(),
            },
            SyncPasscodeState::None => return Inner::send_change_passcode(this, passcode),
            SyncPasscodeState::Unspecified => {
                tracing::debug!("dropping passcode; remote passcode state unspecified");
                return Ok(());
            }
        };
        tracing::info!(command = command.kind(), "sending passcode to remote");
        this.sink.send(command)?;
        Ok(())
    }

    fn send_change_passcode(this: &Rc<Inner>, passcode: &str) -> KeySyncResult<()> {
        let results = this.protocol.change_result().clone();
        let baseline = results.version();

        this.sink.send(SyncCommand::ChangePasscode {
            passcode: passcode.to_string(),
        })?;
        tracing::info!("change passcode sent");

        if let Some(previous) = this.pending_change.borrow_mut().take() {
            previous.dispose();
        }

        let weak: Weak<Inner> = Rc::downgrade(this);
        let one_shot = OneShotMonitor::new(&this.ctx, "change-passcode-result", move || {
            let Some(inner) = weak.upgrade() else {
                return true;
            };
            let result = results.get();
            if results.version() <= baseline {
                return false;
            }
            let Some(outcome) = result.get().copied() else {
                return false;
            };
            inner.on_change_result(outcome);
            true
        });
        *this.pending_change.borrow_mut() = Some(one_shot.clone());
        one_shot.activate()
    }

    fn on_change_result(&self, outcome: ChangePasscodeResult) {
        match outcome {
            ChangePasscodeResult::Success => {
                tracing::info!("passcode changed");
                self.last_error.set(PasscodeError::None);
            }
            ChangePasscodeResult::TemporaryFailure => {
                tracing::warn!("passcode change failed temporarily; prompting again");
                self.last_error.set(PasscodeError::TemporaryFailure);
                if let Some(provider) = self.provider() {
                    provider.request_new_passcode(false, PasscodeError::TemporaryFailure);
                }
            }
            ChangePasscodeResult::Failure => {
                tracing::warn!("passcode change rejected by remote");
                self.last_error.set(PasscodeError::SyncFailure);
            }
        }
    }

    fn dispose_all(&self) {
        let monitors = [
            self.passcode_monitor.borrow_mut().take(),
            self.error_monitor.borrow_mut().take(),
        ];
        for monitor in monitors.into_iter().flatten() {
            monitor.dispose();
        }
        let waits = [
            self.pending_set.borrow_mut().take(),
            self.pending_change.borrow_mut().take(),
        ];
        for wait in waits.into_iter().flatten() {
            wait.dispose();
        }
    }
}

impl KeySource for PasscodeKeySource {
    fn kind(&self) -> KeySourceKind {
        KeySourceKind::Challenge
    }

    fn start(&self) -> KeySyncResult<()> {
        if self.is_started() {
            return Ok(());
        }
        tracing::info!("starting passcode key source");

        let weak = Rc::downgrade(&self.inner);
        let error_monitor = Monitor::new(&self.inner.ctx, "sync-error", move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_sync_error();
            }
            Ok(())
        });

        let weak = Rc::downgrade(&self.inner);
        let passcode_monitor = Monitor::new(&self.inner.ctx, "passcode-state", move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_passcode_state();
            }
            Ok(())
        });

        *self.inner.error_monitor.borrow_mut() = Some(error_monitor.clone());
        *self.inner.passcode_monitor.borrow_mut() = Some(passcode_monitor.clone());

        // Classify first so the first prompt carries the current error.
        error_monitor.activate()?;
        passcode_monitor.activate()
    }

    fn stop(&self) {
        if self.is_started() {
            tracing::info!("stopping passcode key source");
        }
        self.inner.dispose_all();
    }

    fn change_passcode(&self) {
        match self.inner.provider() {
            Some(provider) => provider.request_new_passcode(true, PasscodeError::None),
            None => tracing::debug!("change passcode requested without a provider"),
        }
    }

    fn forgot_passcode(&self) {
        self.inner.forgot.set(true);
        match self.inner.provider() {
            Some(provider) => provider.request_new_passcode(false, PasscodeError::None),
            None => tracing::debug!("forgot passcode requested without a provider"),
        }
    }

    fn retry_failed_events(&self) {
        // The remote retries its own key-storage requests.
        tracing::debug!("retry_failed_events ignored for challenge key source");
    }
}
