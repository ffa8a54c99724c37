//! The application-lifetime context that owns every service.
//!
//! A [`Session`] is built once from its collaborators and holds the only
//! key-source registry, identity sync and user registry of the process.
//! Nothing here is a global; two sessions on two reactive contexts are fully
//! independent.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{ErrorContext, KeySourceError, KeySyncResult, ResultExt};
use crate::identity::{IdentitySync, SyncOptions, SyncReport, UserRegistry};
use crate::keysource::{
    KeySource, KeySourceKind, KeySourceRegistry, ManagedKeySource, PasscodeKeySource,
};
use crate::protocol::ProtocolState;
use crate::reactive::ReactiveContext;
use crate::traits::{
    CommandSink, DirectoryProvider, KeyProtectionManager, KeyStorageFactory, PasscodeProvider,
    RegistrationResolver,
};

/// External collaborators a session is wired to.
#[derive(Clone)]
pub struct SessionServices {
    pub sink: Rc<dyn CommandSink>,
    pub directory: Arc<dyn DirectoryProvider>,
    pub resolver: Rc<dyn RegistrationResolver>,
    /// Required for the directory and push-identity key sources.
    pub key_storage: Option<KeyStorageServices>,
}

#[derive(Clone)]
pub struct KeyStorageServices {
    pub factory: Rc<dyn KeyStorageFactory>,
    pub manager: Rc<dyn KeyProtectionManager>,
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    protocol: ProtocolState,
    services: SessionServices,
    key_sources: KeySourceRegistry,
    passcode_source: PasscodeKeySource,
    identity: IdentitySync,
    users: UserRegistry,
    started: Cell<bool>,
}

impl Session {
    pub fn new(
        protocol: &ProtocolState,
        config: SessionConfig,
        services: SessionServices,
    ) -> KeySyncResult<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        let ctx = protocol.context();

        let passcode_source = PasscodeKeySource::new(protocol, Rc::clone(&services.sink));
        let identity = IdentitySync::new(
            protocol,
            Arc::clone(&services.directory),
            Rc::clone(&services.resolver),
            SyncOptions {
                page_size: config.directory_page_size,
                force_refresh: config.force_refresh_lookups,
            },
        );
        let users = UserRegistry::new(ctx);
        identity.add_listener(users.listener());

        tracing::debug!(session_id = %id, key_source = config.key_source.as_str(), "session created");
        Ok(Self {
            id,
            created_at: Utc::now(),
            config,
            protocol: protocol.clone(),
            services,
            key_sources: KeySourceRegistry::new(),
            passcode_source,
            identity,
            users,
            started: Cell::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn context(&self) -> &ReactiveContext {
        self.protocol.context()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn protocol(&self) -> &ProtocolState {
        &self.protocol
    }

    pub fn key_sources(&self) -> &KeySourceRegistry {
        &self.key_sources
    }

    /// The challenge-backed source, whether or not it is installed.
    pub fn passcode_key_source(&self) -> &PasscodeKeySource {
        &self.passcode_source
    }

    pub fn set_passcode_provider(&self, provider: Option<Rc<dyn PasscodeProvider>>) {
        self.passcode_source.set_passcode_provider(provider);
    }

    pub fn identity(&self) -> &IdentitySync {
        &self.identity
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    fn error_context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new(operation)
            .with_component("session")
            .with_session_id(self.id.to_string())
    }

    /// Build the provider `kind` against this session's collaborators.
    pub fn build_key_source(&self, kind: KeySourceKind) -> KeySyncResult<Rc<dyn KeySource>> {
        let build = match kind {
            KeySourceKind::Challenge => return Ok(Rc::new(self.passcode_source.clone())),
            KeySourceKind::Directory => ManagedKeySource::directory,
            KeySourceKind::PushIdentity => ManagedKeySource::push_identity,
        };
        let Some(storage) = self.services.key_storage.as_ref() else {
            return Err(KeySourceError::NotInstalled)
                .with_context(|| self.error_context("build_key_source"));
        };
        let source = build(
            &self.protocol,
            Rc::clone(&storage.factory),
            Rc::clone(&storage.manager),
        );
        Ok(Rc::new(source))
    }

    /// Stop whatever provider is active, then install and start `source`.
    pub fn install_key_source(&self, source: Rc<dyn KeySource>) -> KeySyncResult<()> {
        let kind = source.kind();
        self.key_sources
            .install(source)
            .with_context(|| self.error_context("install_key_source"))?;
        tracing::info!(session_id = %self.id, key_source = kind.as_str(), "key source installed");
        Ok(())
    }

    /// Install the configured key source and start following the local user.
    pub fn start(&self) -> KeySyncResult<()> {
        if self.started.get() {
            return Ok(());
        }
        let source = self.build_key_source(self.config.key_source)?;
        self.install_key_source(source)?;
        self.identity
            .start()
            .with_context(|| self.error_context("start_identity_sync"))?;
        self.started.set(true);
        tracing::info!(session_id = %self.id, "session started");
        Ok(())
    }

    /// Stop the key source and identity sync. Leaves no monitor behind.
    pub fn stop(&self) {
        self.key_sources.clear();
        self.passcode_source.stop();
        self.identity.stop();
        if self.started.replace(false) {
            tracing::info!(session_id = %self.id, "session stopped");
        }
    }

    /// Run one full directory reconciliation pass.
    pub async fn sync_directory(&self) -> SyncReport {
        self.identity.sync_all().await
    }

    pub async fn sync_user(&self, remote_id: &str) -> KeySyncResult<()> {
        self.identity
            .sync_user(remote_id)
            .await
            .with_context(|| self.error_context("sync_user").with_remote_id(remote_id))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{
        InMemoryDirectory, ManualResolver, MockKeyProtectionManager, MockKeyStorageFactory,
        RecordingSink,
    };

    fn services(ctx: &ReactiveContext, with_storage: bool) -> SessionServices {
        SessionServices {
            sink: Rc::new(RecordingSink::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            resolver: Rc::new(ManualResolver::new(ctx)),
            key_storage: with_storage.then(|| KeyStorageServices {
                factory: Rc::new(MockKeyStorageFactory::default()),
                manager: Rc::new(MockKeyProtectionManager::default()),
            }),
        }
    }

    #[test]
    fn test_start_installs_configured_source() {
        let ctx = ReactiveContext::new();
        let protocol = ProtocolState::new(&ctx);
        let session =
            Session::new(&protocol, SessionConfig::default(), services(&ctx, false)).unwrap();

        session.start().unwrap();
        session.start().unwrap();
        assert!(session.is_started());
        assert_eq!(
            session.key_sources().current_kind(),
            Some(KeySourceKind::Challenge)
        );

        session.stop();
        assert_eq!(ctx.active_monitors(), 0);
        assert!(session.key_sources().get().is_none());
    }

    #[test]
    fn test_managed_source_requires_storage() {
        let ctx = ReactiveContext::new();
        let protocol = ProtocolState::new(&ctx);
        let config = SessionConfig::default().with_key_source(KeySourceKind::Directory);
        let session = Session::new(&protocol, config, services(&ctx, false)).unwrap();

        let err = session.start().unwrap_err();
        assert_eq!(err.error_code(), "E_KEY_NOT_INSTALLED");
        assert_eq!(err.context().unwrap().component.as_deref(), Some("session"));
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
        assert!(!err.is_retryable());
        assert!(err.recovery_hint().contains("configuration"));
        assert!(err.user_message().contains("build_key_source"));
        assert!(!session.is_started());
    }

    #[test]
    fn test_swap_stops_previous_source() {
        let ctx = ReactiveContext::new();
        let protocol = ProtocolState::new(&ctx);
        let session =
            Session::new(&protocol, SessionConfig::default(), services(&ctx, true)).unwrap();
        session.start().unwrap();
        assert!(session.passcode_key_source().is_started());

        let push = session
            .build_key_source(KeySourceKind::PushIdentity)
            .unwrap();
        session.install_key_source(push).unwrap();
        assert!(!session.passcode_key_source().is_started());
        assert_eq!(
            session.key_sources().current_kind(),
            Some(KeySourceKind::PushIdentity)
        );
    }

    #[test]
    fn test_local_user_change_outside_runtime_is_deferred() {
        let ctx = ReactiveContext::new();
        let protocol = ProtocolState::new(&ctx);
        let directory = Arc::new(InMemoryDirectory::new());
        directory.set_self_user(Some(crate::traits::DirectoryUser {
            id: "me".to_string(),
            display_name: "Me".to_string(),
            email: None,
            avatar_url: None,
        }));
        let mut services = services(&ctx, false);
        services.directory = directory;
        let session = Session::new(&protocol, SessionConfig::default(), services).unwrap();
        session.start().unwrap();

        protocol
            .local_user()
            .set(crate::protocol::LocalUserRecord::registered(7, "me"));
        assert!(session.users().local_user().peek().is_none());

        // The graph still reacts to later writes.
        protocol.publish_setup(
            crate::protocol::SetupState::SyncRequired,
            crate::reactive::Tracked::present(crate::protocol::SyncPasscodeState::New),
        );
        assert!(ctx.take_failures().is_empty());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(ctx.run_until(async {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
        }));
        assert_eq!(
            session
                .users()
                .local_user()
                .peek()
                .map(|user| user.registration_id()),
            Some(7)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ctx = ReactiveContext::new();
        let protocol = ProtocolState::new(&ctx);
        let config = SessionConfig::default().with_directory_page_size(0);
        assert!(Session::new(&protocol, config, services(&ctx, false)).is_err());
    }
}
