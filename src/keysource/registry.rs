//! The single active key-source slot.

use std::cell::RefCell;
use std::rc::Rc;

use super::{KeySource, KeySourceKind};
use crate::error::KeySyncResult;

/// Holds at most one active [`KeySource`].
///
/// Swapping always stops the outgoing source before the new one is
/// installed, so two providers never own the key-protection manager at once.
#[derive(Default)]
pub struct KeySourceRegistry {
    current: RefCell<Option<Rc<dyn KeySource>>>,
}

impl KeySourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current source (if any) and store `source` without
    /// starting it. Returns the previous source.
    pub fn replace(&self, source: Rc<dyn KeySource>) -> Option<Rc<dyn KeySource>> {
        let previous = self.current.borrow_mut().take();
        if let Some(ref outgoing) = previous {
            tracing::info!(
                from = outgoing.kind().as_str(),
                to = source.kind().as_str(),
                "replacing key source"
            );
            outgoing.stop();
        }
        *self.current.borrow_mut() = Some(source);
        previous
    }

    /// [`replace`](Self::replace), then start the new source.
    pub fn install(&self, source: Rc<dyn KeySource>) -> KeySyncResult<()> {
        self.replace(Rc::clone(&source));
        source.start()
    }

    pub fn get(&self) -> Option<Rc<dyn KeySource>> {
        self.current.borrow().clone()
    }

    pub fn current_kind(&self) -> Option<KeySourceKind> {
        self.current.borrow().as_ref().map(|source| source.kind())
    }

    /// Stop and remove the current source.
    pub fn clear(&self) -> Option<Rc<dyn KeySource>> {
        let previous = self.current.borrow_mut().take();
        if let Some(ref outgoing) = previous {
            tracing::info!(kind = outgoing.kind().as_str(), "clearing key source");
            outgoing.stop();
        }
        previous
    }
}
