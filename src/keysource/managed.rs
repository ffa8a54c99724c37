//! Key sources backed by the external key-protection manager.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{KeySource, KeySourceKind};
use crate::error::{KeySourceError, KeySyncResult};
use crate::protocol::{HostState, ProtocolState};
use crate::reactive::{Observable, OneShotMonitor, ReactiveContext, Tracked};
use crate::traits::{FailureListener, KeyProtectionManager, KeyStorageFactory};

/// Readiness predicate: the identity to create storage for, once ready.
///
/// Runs inside a one-shot monitor, so every observable it reads re-arms it.
pub type Readiness = Rc<dyn Fn() -> Option<String>>;

/// Ready when `identifier` is present and the host has started.
pub fn identifier_when_started(
    identifier: Observable<Tracked<String>>,
    host: Observable<HostState>,
) -> Readiness {
    Rc::new(move || {
        let id = identifier.get();
        let started = host.get() == HostState::Started;
        match id.into_present() {
            Some(id) if started && !id.is_empty() => Some(id),
            _ => None,
        }
    })
}

/// Two-phase key source: wait for readiness, then start the manager.
///
/// If the host never starts the wait stays pending until [`stop`].
///
/// [`stop`]: KeySource::stop
#[derive(Clone)]
pub struct ManagedKeySource {
    inner: Rc<Inner>,
}

struct Inner {
    ctx: ReactiveContext,
    kind: KeySourceKind,
    readiness: Readiness,
    factory: Rc<dyn KeyStorageFactory>,
    manager: Rc<dyn KeyProtectionManager>,
    waiting: RefCell<Option<OneShotMonitor>>,
    running: Cell<bool>,
    last_failure: Observable<Option<KeySourceError>>,
}

impl ManagedKeySource {
    pub fn new(
        ctx: &ReactiveContext,
        kind: KeySourceKind,
        readiness: Readiness,
        factory: Rc<dyn KeyStorageFactory>,
        manager: Rc<dyn KeyProtectionManager>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                ctx: ctx.clone(),
                kind,
                readiness,
                factory,
                manager,
                waiting: RefCell::new(None),
                running: Cell::new(false),
                last_failure: Observable::new(ctx, None),
            }),
        }
    }

    /// Directory-backed: keyed on the directory's authenticated identifier.
    pub fn directory(
        protocol: &ProtocolState,
        factory: Rc<dyn KeyStorageFactory>,
        manager: Rc<dyn KeyProtectionManager>,
    ) -> Self {
        let readiness = identifier_when_started(
            protocol.auth_identifier().clone(),
            protocol.host_state().clone(),
        );
        Self::new(
            protocol.context(),
            KeySourceKind::Directory,
            readiness,
            factory,
            manager,
        )
    }

    /// Push-identity-backed: keyed on the push service identity.
    pub fn push_identity(
        protocol: &ProtocolState,
        factory: Rc<dyn KeyStorageFactory>,
        manager: Rc<dyn KeyProtectionManager>,
    ) -> Self {
        let readiness = identifier_when_started(
            protocol.push_identity().clone(),
            protocol.host_state().clone(),
        );
        Self::new(
            protocol.context(),
            KeySourceKind::PushIdentity,
            readiness,
            factory,
            manager,
        )
    }

    /// The manager has been started and not stopped since.
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Still waiting for the readiness precondition.
    pub fn is_waiting(&self) -> bool {
        self.inner
            .waiting
            .borrow()
            .as_ref()
            .is_some_and(OneShotMonitor::is_pending)
    }

    /// Latest failure reported by the manager after it started.
    pub fn last_failure(&self) -> &Observable<Option<KeySourceError>> {
        &self.inner.last_failure
    }
}

impl Inner {
    fn start_manager(&self, identifier: &str) -> Result<(), KeySourceError> {
        let client = self.factory.create(identifier)?;

        let failures = self.last_failure.clone();
        let kind = self.kind;
        let listener: FailureListener = Rc::new(move |error: KeySourceError| {
            tracing::warn!(source = kind.as_str(), error = %error, "key protection failure");
            failures.set(Some(error));
        });

        self.manager.start(client, listener)?;
        self.running.set(true);
        tracing::info!(source = self.kind.as_str(), "key protection manager started");
        Ok(())
    }
}

impl KeySource for ManagedKeySource {
    fn kind(&self) -> KeySourceKind {
        self.inner.kind
    }

    fn start(&self) -> KeySyncResult<()> {
        if self.is_running() || self.is_waiting() {
            return Ok(());
        }
        tracing::info!(source = self.inner.kind.as_str(), "waiting for key source readiness");

        let weak = Rc::downgrade(&self.inner);
        let one_shot = OneShotMonitor::try_new(
            &self.inner.ctx,
            format!("{}-readiness", self.inner.kind.as_str()),
            move || {
                let Some(inner) = weak.upgrade() else {
                    return Ok(true);
                };
                let Some(identifier) = (inner.readiness)() else {
                    return Ok(false);
                };
                inner.start_manager(&identifier)?;
                Ok(true)
            },
        );
        *self.inner.waiting.borrow_mut() = Some(one_shot.clone());
        one_shot.activate()
    }

    fn stop(&self) {
        if let Some(waiting) = self.inner.waiting.borrow_mut().take() {
            waiting.dispose();
        }
        if self.inner.running.replace(false) {
            self.inner.manager.stop();
            tracing::info!(source = self.inner.kind.as_str(), "key protection manager stopped");
        }
    }

    fn change_passcode(&self) {
        self.inner.manager.change_passcode();
    }

    fn forgot_passcode(&self) {
        self.inner.manager.forgot_passcode();
    }

    fn retry_failed_events(&self) {
        self.inner.manager.retry_failed_events();
    }
}
