//! In-memory directory for testing.
//!
//! Serves a fixed user list with cursor pagination, without any network
//! access. Failures can be injected for the next call.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::DirectoryError;
use crate::traits::{DirectoryPage, DirectoryProvider, DirectoryUser};

/// In-memory [`DirectoryProvider`].
///
/// Cursors are plain offsets into the user list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    /// Users returned by `fetch_all_users`/`fetch_user`
    users: Arc<Mutex<Vec<DirectoryUser>>>,
    /// Profile returned by `fetch_self`
    self_user: Arc<Mutex<Option<DirectoryUser>>>,
    /// Error returned by the next call, whatever it is
    fail_next: Arc<Mutex<Option<DirectoryError>>>,
    /// Number of calls made so far
    calls: Arc<Mutex<usize>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_users(&self, users: impl IntoIterator<Item = DirectoryUser>) {
        self.users.lock().unwrap().extend(users);
    }

    pub fn set_self_user(&self, user: Option<DirectoryUser>) {
        *self.self_user.lock().unwrap() = user;
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: DirectoryError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn begin_call(&self) -> Result<(), DirectoryError> {
        *self.calls.lock().unwrap() += 1;
        match self.fail_next.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    async fn fetch_self(&self) -> Result<DirectoryUser, DirectoryError> {
        self.begin_call()?;
        self.self_user
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DirectoryError::NotFound {
                id: "self".to_string(),
            })
    }

    async fn fetch_user(&self, id: &str) -> Result<DirectoryUser, DirectoryError> {
        self.begin_call()?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound { id: id.to_string() })
    }

    async fn fetch_all_users(
        &self,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<DirectoryPage, DirectoryError> {
        self.begin_call()?;
        let offset = match cursor {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| DirectoryError::Malformed {
                message: format!("bad cursor {cursor:?}"),
            })?,
            None => 0,
        };

        let users = self.users.lock().unwrap();
        let end = (offset + page_size.max(1)).min(users.len());
        let page = users.get(offset..end).unwrap_or_default().to_vec();
        let next_page = (end < users.len()).then(|| end.to_string());
        Ok(DirectoryPage {
            users: page,
            next_page,
        })
    }
}
