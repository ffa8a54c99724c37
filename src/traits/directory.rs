//! Remote user directory abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// A user record as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One page of [`DirectoryProvider::fetch_all_users`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryPage {
    pub users: Vec<DirectoryUser>,
    /// Cursor for the next page; `None` on the last page.
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Read access to a remote user directory.
///
/// Transport and authentication are the implementation's business. The
/// futures are awaited on the reactive context's thread, so completions
/// land where observables may be touched.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// The signed-in user's own profile.
    async fn fetch_self(&self) -> Result<DirectoryUser, DirectoryError>;

    async fn fetch_user(&self, id: &str) -> Result<DirectoryUser, DirectoryError>;

    /// One page of the full user list, starting at `cursor` (`None` for the
    /// first page).
    async fn fetch_all_users(
        &self,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<DirectoryPage, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_page_deserializes_with_defaults() {
        let json = r#"{"users":[{"id":"a","display_name":"Ada"}]}"#;
        let page: DirectoryPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].email, None);
        assert_eq!(page.next_page, None);
    }
}
