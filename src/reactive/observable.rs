//! Version-tracked value cells.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::{ContextInner, ObservableId, ReactiveContext};

/// A shared, version-tracked value.
///
/// Reads through [`get`](Self::get) or [`with`](Self::with) inside a running
/// monitor subscribe that monitor; writes bump the version and reschedule
/// every subscriber. Cloning shares the same cell.
///
/// If the owning [`ReactiveContext`] is dropped the cell keeps working as a
/// plain value holder.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

struct ObservableInner<T> {
    id: ObservableId,
    ctx: Weak<ContextInner>,
    value: RefCell<T>,
}

impl<T> Drop for ObservableInner<T> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.unregister_observable(self.id);
        }
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.version())
            .finish()
    }
}

impl<T> Observable<T> {
    pub fn new(ctx: &ReactiveContext, value: T) -> Self {
        let id = ctx.inner().register_observable();
        Self {
            inner: Rc::new(ObservableInner {
                id,
                ctx: ctx.downgrade(),
                value: RefCell::new(value),
            }),
        }
    }

    fn track(&self) {
        if let Some(ctx) = self.inner.ctx.upgrade() {
            ctx.record_read(self.inner.id);
        }
    }

    /// Borrow the value, recording the read for the running monitor.
    ///
    /// `f` must not write to this same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Bump the version and reschedule dependents without changing the value.
    pub fn mark_dirty(&self) {
        if let Some(ctx) = self.inner.ctx.upgrade() {
            ctx.mark_dirty(self.inner.id);
        }
    }

    /// Mutate in place, then mark dirty unconditionally.
    ///
    /// Use this for event-like values where writing the same value twice
    /// must still wake dependents.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.mark_dirty();
    }

    /// Current version; increases by one per effective write.
    pub fn version(&self) -> u64 {
        self.inner
            .ctx
            .upgrade()
            .map(|ctx| ctx.version_of(self.inner.id))
            .unwrap_or(0)
    }
}

impl<T: Clone> Observable<T> {
    /// Current value, recording the read for the running monitor.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Current value without subscribing anyone.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq> Observable<T> {
    /// Replace the value. Returns false (and notifies nobody) if it is equal
    /// to the current one.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.mark_dirty();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bumps_version_once_per_change() {
        let ctx = ReactiveContext::new();
        let obs = Observable::new(&ctx, 1);
        assert_eq!(obs.version(), 0);

        assert!(obs.set(2));
        assert_eq!(obs.version(), 1);

        assert!(!obs.set(2));
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn test_update_always_bumps() {
        let ctx = ReactiveContext::new();
        let obs = Observable::new(&ctx, 7);
        obs.update(|v| *v = 7);
        obs.update(|v| *v = 7);
        assert_eq!(obs.version(), 2);
        assert_eq!(obs.peek(), 7);
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = ReactiveContext::new();
        let a = Observable::new(&ctx, String::from("x"));
        let b = a.clone();
        b.set("y".to_string());
        assert_eq!(a.get(), "y");
        assert_eq!(a.version(), b.version());
    }

    #[test]
    fn test_survives_context_drop() {
        let ctx = ReactiveContext::new();
        let obs = Observable::new(&ctx, 1);
        drop(ctx);
        assert!(obs.set(5));
        assert_eq!(obs.get(), 5);
        assert_eq!(obs.version(), 0);
    }
}
