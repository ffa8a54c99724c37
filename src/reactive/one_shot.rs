//! "Run until true" monitors.

use std::cell::Cell;
use std::rc::Rc;

use super::context::{ReactiveContext, RunOutcome};
use super::monitor::Monitor;
use crate::error::KeySyncResult;

/// A monitor whose body is a predicate.
///
/// The predicate runs on activation and again on every change to what it
/// read, until it returns `true`; the monitor then disposes itself and never
/// runs again. There is no timeout: a predicate whose precondition never
/// holds stays pending until someone disposes it.
///
/// Predicates should only read observables and local state.
#[derive(Clone, Debug)]
pub struct OneShotMonitor {
    monitor: Monitor,
    finished: Rc<Cell<bool>>,
}

impl OneShotMonitor {
    pub fn new<F>(ctx: &ReactiveContext, name: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        Self::try_new(ctx, name, move || Ok(predicate()))
    }

    /// Like [`new`](Self::new) for predicates that can fail. A failed attempt
    /// leaves the monitor pending.
    pub fn try_new<F>(ctx: &ReactiveContext, name: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut() -> KeySyncResult<bool> + 'static,
    {
        let finished = Rc::new(Cell::new(false));
        let done = Rc::clone(&finished);
        let monitor = Monitor::from_body(
            ctx,
            name.into(),
            Box::new(move || {
                if predicate()? {
                    done.set(true);
                    Ok(RunOutcome::Finished)
                } else {
                    Ok(RunOutcome::Continue)
                }
            }),
        );
        Self { monitor, finished }
    }

    /// Create and activate in one step.
    pub fn run<F>(ctx: &ReactiveContext, name: impl Into<String>, predicate: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        let one_shot = Self::new(ctx, name, predicate);
        // Infallible predicate: activation cannot fail.
        let _ = one_shot.activate();
        one_shot
    }

    pub fn activate(&self) -> KeySyncResult<()> {
        self.monitor.activate()
    }

    pub fn dispose(&self) {
        self.monitor.dispose();
    }

    /// Activated and still waiting for its predicate.
    pub fn is_pending(&self) -> bool {
        self.monitor.is_active()
    }

    /// The predicate has returned true.
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub fn run_count(&self) -> u64 {
        self.monitor.run_count()
    }

    pub fn name(&self) -> &str {
        self.monitor.name()
    }
}
