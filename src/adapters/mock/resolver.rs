//! Registration resolver driven by the test.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::reactive::{Observable, ReactiveContext, Tracked};
use crate::traits::RegistrationResolver;

/// [`RegistrationResolver`] whose answers are set by hand.
///
/// Every lookup of an id returns the same observable; it stays `Unknown`
/// until [`resolve`](Self::resolve) is called for that id.
#[derive(Debug)]
pub struct ManualResolver {
    ctx: ReactiveContext,
    entries: RefCell<HashMap<String, Observable<Tracked<u64>>>>,
    requested: RefCell<Vec<String>>,
}

impl ManualResolver {
    pub fn new(ctx: &ReactiveContext) -> Self {
        Self {
            ctx: ctx.clone(),
            entries: RefCell::new(HashMap::new()),
            requested: RefCell::new(Vec::new()),
        }
    }

    fn entry(&self, remote_id: &str) -> Observable<Tracked<u64>> {
        self.entries
            .borrow_mut()
            .entry(remote_id.to_string())
            .or_insert_with(|| Observable::new(&self.ctx, Tracked::unknown()))
            .clone()
    }

    /// Publish the answer for `remote_id`.
    pub fn resolve(&self, remote_id: &str, answer: Tracked<u64>) {
        let entry = self.entry(remote_id);
        entry.set(answer);
    }

    /// Ids looked up so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl RegistrationResolver for ManualResolver {
    fn lookup(&self, remote_id: &str, _force_refresh: bool) -> Observable<Tracked<u64>> {
        self.requested.borrow_mut().push(remote_id.to_string());
        self.entry(remote_id)
    }
}
