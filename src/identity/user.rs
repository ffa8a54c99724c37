//! Local user records and the events that carry them.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::reactive::Existence;
use crate::traits::DirectoryUser;

/// A directory user that has been matched to a local registration id.
///
/// Immutable once built, except that its existence may move from
/// `Unknown` to `Present` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    #[serde(default)]
    existence: Existence,
    registration_id: u64,
    remote_id: String,
    display_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl AppUser {
    pub fn from_directory(user: &DirectoryUser, registration_id: u64) -> Self {
        Self {
            existence: Existence::Unknown,
            registration_id,
            remote_id: user.id.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }

    pub fn existence(&self) -> Existence {
        self.existence
    }

    /// Confirm the user. Returns false unless this moved it out of `Unknown`.
    pub fn mark_present(&mut self) -> bool {
        if self.existence != Existence::Unknown {
            return false;
        }
        self.existence = Existence::Present;
        true
    }

    pub fn registration_id(&self) -> u64 {
        self.registration_id
    }

    /// Identifier in the remote directory.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}

/// Emitted by identity synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// A remote user resolved to a local registration id.
    Added(AppUser),
    /// The signed-in user's own profile was refreshed.
    LocalUpdated(AppUser),
}

impl UserEvent {
    pub fn user(&self) -> &AppUser {
        match self {
            UserEvent::Added(user) | UserEvent::LocalUpdated(user) => user,
        }
    }
}

pub type UserEventListener = Rc<dyn Fn(&UserEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_directory_copies_profile() {
        let remote = DirectoryUser {
            id: "u-1".to_string(),
            display_name: "Ada".to_string(),
            email: Some("ada@example.com".to_string()),
            avatar_url: None,
        };
        let user = AppUser::from_directory(&remote, 101);
        assert_eq!(user.registration_id(), 101);
        assert_eq!(user.remote_id(), "u-1");
        assert_eq!(user.display_name(), "Ada");
        assert_eq!(user.email(), Some("ada@example.com"));
        assert_eq!(user.existence(), Existence::Unknown);
        assert_eq!(UserEvent::Added(user.clone()).user(), &user);
    }

    #[test]
    fn test_existence_only_moves_to_present_once() {
        let remote = DirectoryUser {
            id: "u-2".to_string(),
            display_name: "Grace".to_string(),
            email: None,
            avatar_url: None,
        };
        let mut user = AppUser::from_directory(&remote, 102);
        assert!(user.mark_present());
        assert_eq!(user.existence(), Existence::Present);

        assert!(!user.mark_present());
        assert_eq!(user.existence(), Existence::Present);
        assert_eq!(user.registration_id(), 102);
    }

    #[test]
    fn test_absent_user_cannot_become_present() {
        let mut user: AppUser = serde_json::from_str(
            r#"{"existence": "absent", "registration_id": 5, "remote_id": "x", "display_name": "X"}"#,
        )
        .unwrap();
        assert!(!user.mark_present());
        assert_eq!(user.existence(), Existence::Absent);
    }
}
