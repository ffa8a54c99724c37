//! Remote protocol state and commands.
//!
//! [`ProtocolState`] is owned by whatever connects to the remote setup/sync
//! protocol. It publishes the remote's state as observables; the key sources
//! only read them and answer through a [`CommandSink`](crate::traits::CommandSink).

mod command;
mod state;

pub use command::{SyncAction, SyncCommand};
pub use state::{
    ChangePasscodeResult, HostState, LocalUserRecord, SetupState, SyncErrorKind,
    SyncPasscodeState,
};

use crate::reactive::{BatchScope, Observable, ReactiveContext, Tracked};

/// Observables published by the protocol connector.
///
/// Cloning shares the same cells.
#[derive(Clone, Debug)]
pub struct ProtocolState {
    ctx: ReactiveContext,
    setup_state: Observable<SetupState>,
    passcode_state: Observable<Tracked<SyncPasscodeState>>,
    sync_error: Observable<SyncErrorKind>,
    change_result: Observable<Tracked<ChangePasscodeResult>>,
    local_user: Observable<LocalUserRecord>,
    host_state: Observable<HostState>,
    auth_identifier: Observable<Tracked<String>>,
    push_identity: Observable<Tracked<String>>,
}

impl ProtocolState {
    pub fn new(ctx: &ReactiveContext) -> Self {
        Self {
            ctx: ctx.clone(),
            setup_state: Observable::new(ctx, SetupState::Unknown),
            passcode_state: Observable::new(ctx, Tracked::unknown()),
            sync_error: Observable::new(ctx, SyncErrorKind::Unspecified),
            change_result: Observable::new(ctx, Tracked::unknown()),
            local_user: Observable::new(ctx, LocalUserRecord::default()),
            host_state: Observable::new(ctx, HostState::Stopped),
            auth_identifier: Observable::new(ctx, Tracked::unknown()),
            push_identity: Observable::new(ctx, Tracked::unknown()),
        }
    }

    pub fn context(&self) -> &ReactiveContext {
        &self.ctx
    }

    pub fn setup_state(&self) -> &Observable<SetupState> {
        &self.setup_state
    }

    pub fn passcode_state(&self) -> &Observable<Tracked<SyncPasscodeState>> {
        &self.passcode_state
    }

    pub fn sync_error(&self) -> &Observable<SyncErrorKind> {
        &self.sync_error
    }

    pub fn change_result(&self) -> &Observable<Tracked<ChangePasscodeResult>> {
        &self.change_result
    }

    pub fn local_user(&self) -> &Observable<LocalUserRecord> {
        &self.local_user
    }

    pub fn host_state(&self) -> &Observable<HostState> {
        &self.host_state
    }

    /// Stable authenticated identifier from the directory's auth provider.
    pub fn auth_identifier(&self) -> &Observable<Tracked<String>> {
        &self.auth_identifier
    }

    /// Identity issued by the push service.
    pub fn push_identity(&self) -> &Observable<Tracked<String>> {
        &self.push_identity
    }

    /// Publish setup and passcode state together so dependents see one
    /// consistent pair.
    pub fn publish_setup(&self, setup: SetupState, passcode: Tracked<SyncPasscodeState>) {
        let _batch = BatchScope::new(&self.ctx);
        self.setup_state.set(setup);
        self.passcode_state.set(passcode);
    }

    /// Sync errors are events: reporting the same kind twice wakes
    /// dependents twice.
    pub fn report_sync_error(&self, kind: SyncErrorKind) {
        self.sync_error.update(|current| *current = kind);
    }

    /// Change results are events as well.
    pub fn report_change_result(&self, result: ChangePasscodeResult) {
        self.change_result
            .update(|current| *current = Tracked::present(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_unknown() {
        let ctx = ReactiveContext::new();
        let state = ProtocolState::new(&ctx);
        assert_eq!(state.setup_state().peek(), SetupState::Unknown);
        assert!(!state.passcode_state().peek().existence().is_resolved());
        assert_eq!(state.host_state().peek(), HostState::Stopped);
        assert!(!state.local_user().peek().is_registered());
    }

    #[test]
    fn test_repeated_sync_error_bumps_version() {
        let ctx = ReactiveContext::new();
        let state = ProtocolState::new(&ctx);
        state.report_sync_error(SyncErrorKind::IncorrectPasscode);
        state.report_sync_error(SyncErrorKind::IncorrectPasscode);
        assert_eq!(state.sync_error().version(), 2);
    }
}
