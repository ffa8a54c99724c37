//! Directory to local-registry reconciliation.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{AppUser, UserEvent, UserEventListener};
use crate::error::{DirectoryError, KeySyncResult};
use crate::protocol::ProtocolState;
use crate::reactive::{Existence, Monitor, OneShotMonitor, ReactiveContext};
use crate::traits::{DirectoryProvider, DirectoryUser, RegistrationResolver};

/// Knobs for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub page_size: usize,
    /// Passed through to [`RegistrationResolver::lookup`].
    pub force_refresh: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            force_refresh: false,
        }
    }
}

/// What one [`IdentitySync::sync_all`] pass did.
///
/// Lookups may still be pending when the pass returns; their ADD events
/// arrive later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: usize,
    /// Distinct remote users handed to the resolver.
    pub candidates: usize,
    pub skipped_local: usize,
    /// Fetch failure that ended the pass early.
    pub failure: Option<DirectoryError>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Reconciles the remote directory against local registration ids.
///
/// Futures returned here must be polled on the reactive context's thread.
/// Profile fetches started by the local-user monitor are spawned on the
/// context and complete while it is driven.
#[derive(Clone)]
pub struct IdentitySync {
    inner: Rc<Inner>,
}

struct Inner {
    ctx: ReactiveContext,
    protocol: ProtocolState,
    directory: Arc<dyn DirectoryProvider>,
    resolver: Rc<dyn RegistrationResolver>,
    options: SyncOptions,
    listeners: RefCell<Vec<UserEventListener>>,
    lookups: RefCell<HashMap<String, OneShotMonitor>>,
    local_monitor: RefCell<Option<Monitor>>,
    last_local_registration: Cell<Option<u64>>,
    local_fetch: RefCell<Option<JoinHandle<()>>>,
}

impl IdentitySync {
    pub fn new(
        protocol: &ProtocolState,
        directory: Arc<dyn DirectoryProvider>,
        resolver: Rc<dyn RegistrationResolver>,
        options: SyncOptions,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                ctx: protocol.context().clone(),
                protocol: protocol.clone(),
                directory,
                resolver,
                options,
                listeners: RefCell::new(Vec::new()),
                lookups: RefCell::new(HashMap::new()),
                local_monitor: RefCell::new(None),
                last_local_registration: Cell::new(None),
                local_fetch: RefCell::new(None),
            }),
        }
    }

    pub fn add_listener(&self, listener: UserEventListener) {
        self.inner.listeners.borrow_mut().push(listener);
    }

    pub fn options(&self) -> SyncOptions {
        self.inner.options
    }

    /// Lookups still waiting for the resolver.
    pub fn pending_lookups(&self) -> usize {
        let mut lookups = self.inner.lookups.borrow_mut();
        lookups.retain(|_, lookup| lookup.is_pending());
        lookups.len()
    }

    /// Walk every directory page and reconcile each user.
    ///
    /// A fetch failure is logged and ends the pass; nothing is retried until
    /// the next pass.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let mut seen = HashSet::new();
        let mut cursor = None;
        let local_uid = self.inner.protocol.local_user().peek().provider_uid;

        loop {
            let page = match self
                .inner
                .directory
                .fetch_all_users(cursor.take(), self.inner.options.page_size)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(
                        page = report.pages,
                        error = %err,
                        "directory fetch failed; sync pass abandoned"
                    );
                    report.failure = Some(err);
                    break;
                }
            };
            report.pages += 1;

            for user in page.users {
                if local_uid.as_deref() == Some(user.id.as_str()) {
                    report.skipped_local += 1;
                    continue;
                }
                if !seen.insert(user.id.clone()) {
                    continue;
                }
                report.candidates += 1;
                Inner::reconcile(&self.inner, user);
            }

            match page.next_page {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            pages = report.pages,
            candidates = report.candidates,
            complete = report.is_complete(),
            "directory sync pass finished"
        );
        report
    }

    /// Reconcile one requested user.
    pub async fn sync_user(&self, remote_id: &str) -> KeySyncResult<()> {
        let local_uid = self.inner.protocol.local_user().peek().provider_uid;
        if local_uid.as_deref() == Some(remote_id) {
            tracing::debug!(remote_id, "skipping local user");
            return Ok(());
        }

        match self.inner.directory.fetch_user(remote_id).await {
            Ok(user) => {
                Inner::reconcile(&self.inner, user);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(remote_id, error = %err, "directory user fetch failed");
                Err(err.into())
            }
        }
    }

    /// Follow the local user record and refresh its profile on every new
    /// registration id.
    pub fn start(&self) -> KeySyncResult<()> {
        if self.inner.local_monitor.borrow().is_some() {
            return Ok(());
        }

        let weak = Rc::downgrade(&self.inner);
        let monitor = Monitor::new(&self.inner.ctx, "local-user", move || {
            if let Some(inner) = weak.upgrade() {
                Inner::on_local_user(&inner);
            }
            Ok(())
        });
        *self.inner.local_monitor.borrow_mut() = Some(monitor.clone());
        monitor.activate()
    }

    pub fn stop(&self) {
        if let Some(monitor) = self.inner.local_monitor.borrow_mut().take() {
            monitor.dispose();
        }
        if let Some(fetch) = self.inner.local_fetch.borrow_mut().take() {
            fetch.abort();
        }
        self.inner.last_local_registration.set(None);

        let lookups: Vec<OneShotMonitor> = self
            .inner
            .lookups
            .borrow_mut()
            .drain()
            .map(|(_, lookup)| lookup)
            .collect();
        for lookup in lookups {
            lookup.dispose();
        }
    }
}

impl Inner {
    fn emit(&self, event: UserEvent) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Ask the resolver for `user` and emit ADD once it is present.
    ///
    /// A newer reconciliation of the same remote id supersedes a waiting one.
    fn reconcile(this: &Rc<Inner>, user: DirectoryUser) {
        let lookup = this.resolver.lookup(&user.id, this.options.force_refresh);
        let weak: Weak<Inner> = Rc::downgrade(this);
        let remote_id = user.id.clone();

        let one_shot = OneShotMonitor::new(&this.ctx, format!("lookup:{remote_id}"), move || {
            let result = lookup.get();
            match result.existence() {
                Existence::Unknown => false,
                Existence::Absent => {
                    tracing::debug!(remote_id = %user.id, "no registration for remote user");
                    true
                }
                Existence::Present => {
                    let (Some(inner), Some(&registration_id)) = (weak.upgrade(), result.get())
                    else {
                        return true;
                    };
                    tracing::debug!(remote_id = %user.id, registration_id, "remote user resolved");
                    inner.emit(UserEvent::Added(resolved_user(&user, registration_id)));
                    true
                }
            }
        });

        let previous = {
            let mut lookups = this.lookups.borrow_mut();
            lookups.retain(|_, lookup| lookup.is_pending());
            lookups.insert(remote_id, one_shot.clone())
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
        // Infallible predicate.
        let _ = one_shot.activate();
    }

    fn on_local_user(this: &Rc<Inner>) {
        let record = this.protocol.local_user().get();
        if !record.is_registered() {
            return;
        }
        let registration_id = record.registration_id;
        if this.last_local_registration.get() == Some(registration_id) {
            return;
        }
        this.last_local_registration.set(Some(registration_id));
        tracing::debug!(registration_id, "local registration changed; fetching profile");

        let directory = Arc::clone(&this.directory);
        let weak = Rc::downgrade(this);
        let handle = this.ctx.spawn(async move {
            let result = directory.fetch_self().await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.finish_local_fetch(registration_id, result);
        });

        if let Some(previous) = this.local_fetch.borrow_mut().replace(handle) {
            previous.abort();
        }
    }

    fn finish_local_fetch(
        &self,
        registration_id: u64,
        result: Result<DirectoryUser, DirectoryError>,
    ) {
        if self.last_local_registration.get() != Some(registration_id) {
            tracing::debug!(registration_id, "discarding stale local profile");
            return;
        }
        match result {
            Ok(user) => {
                self.emit(UserEvent::LocalUpdated(resolved_user(&user, registration_id)));
            }
            Err(err) => {
                tracing::warn!(registration_id, error = %err, "local profile fetch failed");
                // Let the next change of the record try again.
                self.last_local_registration.set(None);
            }
        }
    }
}

fn resolved_user(user: &DirectoryUser, registration_id: u64) -> AppUser {
    let mut resolved = AppUser::from_directory(user, registration_id);
    resolved.mark_present();
    resolved
}
