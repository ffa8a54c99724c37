//! Local user registry fed by [`UserEvent`]s.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::{AppUser, UserEvent, UserEventListener};
use crate::reactive::{Observable, ReactiveContext};

/// Known users keyed by registration id, plus the signed-in user.
///
/// Both collections are observables, so monitors can follow them.
#[derive(Clone, Debug)]
pub struct UserRegistry {
    users: Observable<BTreeMap<u64, AppUser>>,
    local: Observable<Option<AppUser>>,
}

impl UserRegistry {
    pub fn new(ctx: &ReactiveContext) -> Self {
        Self {
            users: Observable::new(ctx, BTreeMap::new()),
            local: Observable::new(ctx, None),
        }
    }

    /// Apply one event. Returns false if it changed nothing.
    pub fn apply(&self, event: &UserEvent) -> bool {
        match event {
            UserEvent::Added(user) => {
                let unchanged = self
                    .users
                    .with(|users| users.get(&user.registration_id()) == Some(user));
                if unchanged {
                    return false;
                }
                self.users.update(|users| {
                    users.insert(user.registration_id(), user.clone());
                });
                true
            }
            UserEvent::LocalUpdated(user) => self.local.set(Some(user.clone())),
        }
    }

    /// A listener that applies every event to this registry.
    pub fn listener(&self) -> UserEventListener {
        let registry = self.clone();
        Rc::new(move |event: &UserEvent| {
            if registry.apply(event) {
                tracing::debug!(
                    registration_id = event.user().registration_id(),
                    "user registry updated"
                );
            }
        })
    }

    pub fn users(&self) -> &Observable<BTreeMap<u64, AppUser>> {
        &self.users
    }

    pub fn local_user(&self) -> &Observable<Option<AppUser>> {
        &self.local
    }

    pub fn get(&self, registration_id: u64) -> Option<AppUser> {
        self.users
            .with(|users| users.get(&registration_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.users.with(BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::DirectoryUser;

    fn user(id: &str, registration_id: u64) -> AppUser {
        AppUser::from_directory(
            &DirectoryUser {
                id: id.to_string(),
                display_name: id.to_uppercase(),
                email: None,
                avatar_url: None,
            },
            registration_id,
        )
    }

    #[test]
    fn test_added_is_deduplicated() {
        let ctx = ReactiveContext::new();
        let registry = UserRegistry::new(&ctx);

        assert!(registry.apply(&UserEvent::Added(user("a", 101))));
        assert!(!registry.apply(&UserEvent::Added(user("a", 101))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.users().version(), 1);
    }

    #[test]
    fn test_profile_change_replaces_entry() {
        let ctx = ReactiveContext::new();
        let registry = UserRegistry::new(&ctx);
        registry.apply(&UserEvent::Added(user("a", 101)));
        registry.apply(&UserEvent::Added(user("renamed", 101)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(101).unwrap().remote_id(), "renamed");
    }

    #[test]
    fn test_local_update_via_listener() {
        let ctx = ReactiveContext::new();
        let registry = UserRegistry::new(&ctx);
        let listener = registry.listener();

        listener(&UserEvent::LocalUpdated(user("me", 7)));
        assert_eq!(
            registry.local_user().peek().map(|u| u.registration_id()),
            Some(7)
        );
        assert!(registry.is_empty());
    }
}
