//! Common test utilities for integration tests.
//!
//! Builds a reactive context, protocol state and session wired to the
//! in-memory doubles from `keysync::adapters::mock`.

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use keysync::adapters::mock::{
    InMemoryDirectory, ManualResolver, RecordingPasscodeProvider, RecordingSink,
};
use keysync::config::SessionConfig;
use keysync::protocol::ProtocolState;
use keysync::reactive::ReactiveContext;
use keysync::session::{Session, SessionServices};
use keysync::traits::{CommandSink, DirectoryUser};

/// A session plus handles on every double behind it.
pub struct TestSession {
    pub ctx: ReactiveContext,
    pub protocol: ProtocolState,
    pub directory: Arc<InMemoryDirectory>,
    pub resolver: Rc<ManualResolver>,
    pub prompts: Rc<RecordingPasscodeProvider>,
    pub session: Session,
}

/// Session whose commands go to `sink`.
pub fn test_session_with_sink(
    config: SessionConfig,
    sink: impl FnOnce(&ProtocolState) -> Rc<dyn CommandSink>,
) -> TestSession {
    let ctx = ReactiveContext::new();
    let protocol = ProtocolState::new(&ctx);
    let directory = Arc::new(InMemoryDirectory::new());
    let resolver = Rc::new(ManualResolver::new(&ctx));
    let prompts = Rc::new(RecordingPasscodeProvider::new());

    let session = Session::new(
        &protocol,
        config,
        SessionServices {
            sink: sink(&protocol),
            directory: directory.clone(),
            resolver: resolver.clone(),
            key_storage: None,
        },
    )
    .expect("valid config");
    session.set_passcode_provider(Some(prompts.clone()));

    TestSession {
        ctx,
        protocol,
        directory,
        resolver,
        prompts,
        session,
    }
}

pub fn test_session(sink: Rc<RecordingSink>) -> TestSession {
    test_session_with_sink(SessionConfig::default(), move |_| sink as Rc<dyn CommandSink>)
}

pub fn directory_user(id: &str) -> DirectoryUser {
    DirectoryUser {
        id: id.to_string(),
        display_name: format!("User {}", id.to_uppercase()),
        email: Some(format!("{}@example.com", id)),
        avatar_url: None,
    }
}

/// Drive the context's spawned tasks for a few turns.
pub async fn settle(ctx: &ReactiveContext) {
    ctx.run_until(async {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    })
    .await;
}
