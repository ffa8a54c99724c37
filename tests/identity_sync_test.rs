//! Integration tests for identity synchronization.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{directory_user, settle, test_session_with_sink};
use keysync::adapters::mock::RecordingSink;
use keysync::config::SessionConfig;
use keysync::error::DirectoryError;
use keysync::identity::UserEvent;
use keysync::protocol::LocalUserRecord;
use keysync::reactive::{Existence, Tracked};
use keysync::traits::CommandSink;

fn session(config: SessionConfig) -> common::TestSession {
    test_session_with_sink(config, |_| Rc::new(RecordingSink::new()) as Rc<dyn CommandSink>)
}

fn record_events(t: &common::TestSession) -> Rc<RefCell<Vec<UserEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    t.session
        .identity()
        .add_listener(Rc::new(move |event: &UserEvent| {
            sink.borrow_mut().push(event.clone())
        }));
    events
}

fn added(events: &RefCell<Vec<UserEvent>>) -> Vec<(String, u64)> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            UserEvent::Added(user) => Some((user.remote_id().to_string(), user.registration_id())),
            UserEvent::LocalUpdated(_) => None,
        })
        .collect()
}

// =============================================================================
// Directory reconciliation
// =============================================================================

#[tokio::test]
async fn test_three_users_local_skipped_two_added() {
    let t = session(SessionConfig::default());
    let events = record_events(&t);
    t.directory
        .add_users([directory_user("a"), directory_user("b"), directory_user("c")]);
    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(102, "b"));

    let report = t.session.sync_directory().await;
    assert_eq!(report.skipped_local, 1);
    t.resolver.resolve("a", Tracked::present(101));
    t.resolver.resolve("c", Tracked::present(103));

    assert_eq!(
        added(&events),
        vec![("a".to_string(), 101), ("c".to_string(), 103)]
    );
    assert_eq!(t.session.users().len(), 2);
    assert!(t.session.users().get(102).is_none());

    let a = t.session.users().get(101).unwrap();
    assert_eq!(a.display_name(), "User A");
    assert_eq!(a.email(), Some("a@example.com"));
}

#[tokio::test]
async fn test_unknown_lookup_never_adds() {
    let t = session(SessionConfig::default());
    let events = record_events(&t);
    t.directory
        .add_users([directory_user("a"), directory_user("b"), directory_user("c")]);
    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(102, "b"));

    t.session.sync_directory().await;
    t.resolver.resolve("a", Tracked::present(101));

    // Unrelated churn must not release C.
    for id in 200..210 {
        t.resolver.resolve("zzz", Tracked::present(id));
    }
    assert_eq!(added(&events), vec![("a".to_string(), 101)]);
    assert_eq!(t.session.identity().pending_lookups(), 1);
}

#[tokio::test]
async fn test_duplicates_in_one_pass_add_once() {
    let t = session(SessionConfig::default().with_directory_page_size(1));
    let events = record_events(&t);
    t.directory
        .add_users([directory_user("a"), directory_user("a")]);

    let report = t.session.sync_directory().await;
    assert_eq!(report.pages, 2);
    assert_eq!(report.candidates, 1);

    t.resolver.resolve("a", Tracked::present(101));
    assert_eq!(added(&events).len(), 1);
}

#[tokio::test]
async fn test_failed_fetch_leaves_registry_untouched() {
    let t = session(SessionConfig::default());
    t.directory.add_users([directory_user("a")]);
    t.resolver.resolve("a", Tracked::present(101));
    t.directory.fail_next(DirectoryError::Network {
        message: "connection reset".to_string(),
    });

    let report = t.session.sync_directory().await;
    assert!(!report.is_complete());
    assert!(t.session.users().is_empty());

    // The next pass picks it up.
    let report = t.session.sync_directory().await;
    assert!(report.is_complete());
    assert_eq!(t.session.users().len(), 1);
}

#[tokio::test]
async fn test_force_refresh_config_reaches_resolver() {
    let t = session(SessionConfig::default().with_force_refresh_lookups(true));
    assert!(t.session.identity().options().force_refresh);
}

#[tokio::test]
async fn test_sync_user_error_carries_context() {
    let t = session(SessionConfig::default());
    let err = t.session.sync_user("ghost").await.unwrap_err();
    assert_eq!(err.error_code(), "E_DIR_NOT_FOUND");
    assert_eq!(
        err.context().unwrap().remote_id.as_deref(),
        Some("ghost")
    );
}

// =============================================================================
// Local user
// =============================================================================

#[tokio::test]
async fn test_local_user_updated_once_per_registration() {
    let t = session(SessionConfig::default());
    let events = record_events(&t);
    t.directory.set_self_user(Some(directory_user("me")));
    t.session.start().unwrap();

    t.protocol.local_user().set(LocalUserRecord {
        exists: true,
        registration_id: 0,
        provider_uid: Some("me".to_string()),
    });
    settle(&t.ctx).await;
    assert!(events.borrow().is_empty());

    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(7, "me"));
    settle(&t.ctx).await;
    // Same id again, different uid: no second fetch.
    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(7, "me-again"));
    settle(&t.ctx).await;
    assert_eq!(events.borrow().len(), 1);

    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(8, "me"));
    settle(&t.ctx).await;

    let locals: Vec<u64> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            UserEvent::LocalUpdated(user) => Some(user.registration_id()),
            UserEvent::Added(_) => None,
        })
        .collect();
    assert_eq!(locals, vec![7, 8]);
    assert_eq!(
        t.session
            .users()
            .local_user()
            .peek()
            .map(|user| user.registration_id()),
        Some(8)
    );
    assert_eq!(
        t.session
            .users()
            .local_user()
            .peek()
            .map(|user| user.existence()),
        Some(Existence::Present)
    );
}

#[tokio::test]
async fn test_local_fetch_failure_retries_on_next_change() {
    let t = session(SessionConfig::default());
    let events = record_events(&t);
    t.directory.set_self_user(Some(directory_user("me")));
    t.directory.fail_next(DirectoryError::Unauthorized);
    t.session.start().unwrap();

    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(7, "me"));
    settle(&t.ctx).await;
    assert!(events.borrow().is_empty());

    t.protocol.local_user().set(LocalUserRecord::default());
    t.protocol
        .local_user()
        .set(LocalUserRecord::registered(7, "me"));
    settle(&t.ctx).await;
    assert_eq!(events.borrow().len(), 1);
}
