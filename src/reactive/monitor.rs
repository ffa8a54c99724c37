//! Dependency-tracking monitors.

use std::fmt;
use std::rc::Rc;

use super::context::{MonitorShared, MonitorState, ReactiveContext, RunOutcome};
use crate::error::KeySyncResult;

/// A recurring computation that reruns whenever an observable it read during
/// its previous run changes.
///
/// Nothing runs until [`activate`](Self::activate). After
/// [`dispose`](Self::dispose) the body is never invoked again, even if a
/// rerun was already queued. Dropping the handle does not dispose: a
/// component must dispose its monitors when it stops.
#[derive(Clone)]
pub struct Monitor {
    ctx: ReactiveContext,
    shared: Rc<MonitorShared>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.shared.name)
            .field("active", &self.is_active())
            .field("runs", &self.run_count())
            .finish()
    }
}

impl Monitor {
    pub fn new<F>(ctx: &ReactiveContext, name: impl Into<String>, mut body: F) -> Self
    where
        F: FnMut() -> KeySyncResult<()> + 'static,
    {
        Self::from_body(
            ctx,
            name.into(),
            Box::new(move || body().map(|()| RunOutcome::Continue)),
        )
    }

    pub(crate) fn from_body(
        ctx: &ReactiveContext,
        name: String,
        body: super::context::MonitorBody,
    ) -> Self {
        Self {
            ctx: ctx.clone(),
            shared: ctx.inner().new_monitor(name, body),
        }
    }

    /// Run once now and subscribe to what the run read.
    ///
    /// The error of this first run is returned; later reruns report through
    /// [`ReactiveContext::take_failures`]. Activating an already active or
    /// disposed monitor is a no-op.
    pub fn activate(&self) -> KeySyncResult<()> {
        self.ctx.inner().activate(&self.shared)
    }

    /// Unsubscribe and prevent any further run. Idempotent.
    pub fn dispose(&self) {
        if self.shared.state.get() == MonitorState::Idle {
            self.shared.state.set(MonitorState::Disposed);
            return;
        }
        self.ctx.inner().dispose(self.shared.id);
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.get() == MonitorState::Active
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.get() == MonitorState::Disposed
    }

    /// How many times the body has been invoked.
    pub fn run_count(&self) -> u64 {
        self.shared.runs.get()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use std::cell::Cell;

    #[test]
    fn test_activate_runs_immediately() {
        let ctx = ReactiveContext::new();
        let monitor = Monitor::new(&ctx, "noop", || Ok(()));
        assert_eq!(monitor.run_count(), 0);
        monitor.activate().unwrap();
        assert_eq!(monitor.run_count(), 1);
        assert!(monitor.is_active());
    }

    #[test]
    fn test_reruns_on_dependency_change() {
        let ctx = ReactiveContext::new();
        let source = Observable::new(&ctx, 1);
        let seen = Rc::new(Cell::new(0));

        let (src, out) = (source.clone(), Rc::clone(&seen));
        let monitor = Monitor::new(&ctx, "mirror", move || {
            out.set(src.get());
            Ok(())
        });
        monitor.activate().unwrap();
        assert_eq!(seen.get(), 1);

        source.set(5);
        assert_eq!(seen.get(), 5);
        assert_eq!(monitor.run_count(), 2);
    }

    #[test]
    fn test_unread_dependency_is_dropped() {
        let ctx = ReactiveContext::new();
        let use_a = Observable::new(&ctx, true);
        let a = Observable::new(&ctx, 0);
        let b = Observable::new(&ctx, 0);

        let (flag, a2, b2) = (use_a.clone(), a.clone(), b.clone());
        let monitor = Monitor::new(&ctx, "switch", move || {
            if flag.get() {
                a2.get();
            } else {
                b2.get();
            }
            Ok(())
        });
        monitor.activate().unwrap();

        use_a.set(false);
        assert_eq!(monitor.run_count(), 2);

        a.set(1);
        assert_eq!(monitor.run_count(), 2, "a is no longer a dependency");

        b.set(1);
        assert_eq!(monitor.run_count(), 3);
    }

    #[test]
    fn test_zero_reads_is_inert() {
        let ctx = ReactiveContext::new();
        let unrelated = Observable::new(&ctx, 0);
        let monitor = Monitor::new(&ctx, "inert", || Ok(()));
        monitor.activate().unwrap();

        unrelated.set(1);
        unrelated.set(2);
        assert_eq!(monitor.run_count(), 1);
        assert!(monitor.is_active());
    }

    #[test]
    fn test_dispose_stops_reruns() {
        let ctx = ReactiveContext::new();
        let source = Observable::new(&ctx, 0);

        let src = source.clone();
        let monitor = Monitor::new(&ctx, "disposable", move || {
            src.get();
            Ok(())
        });
        monitor.activate().unwrap();
        monitor.dispose();
        monitor.dispose();

        for i in 1..10 {
            source.set(i);
        }
        assert_eq!(monitor.run_count(), 1);
        assert_eq!(ctx.active_monitors(), 0);
    }

    #[test]
    fn test_dispose_before_activate_prevents_run() {
        let ctx = ReactiveContext::new();
        let monitor = Monitor::new(&ctx, "never", || Ok(()));
        monitor.dispose();
        monitor.activate().unwrap();
        assert_eq!(monitor.run_count(), 0);
    }

    #[test]
    fn test_double_activate_is_noop() {
        let ctx = ReactiveContext::new();
        let monitor = Monitor::new(&ctx, "once", || Ok(()));
        monitor.activate().unwrap();
        monitor.activate().unwrap();
        assert_eq!(monitor.run_count(), 1);
    }

    #[test]
    fn test_queued_rerun_skipped_after_dispose() {
        let ctx = ReactiveContext::new();
        let source = Observable::new(&ctx, 0);

        let watcher_src = source.clone();
        let watcher = Monitor::new(&ctx, "watcher", move || {
            watcher_src.get();
            Ok(())
        });
        watcher.activate().unwrap();

        // A second monitor disposes the first in the same flush that
        // already queued it.
        let killer_src = source.clone();
        let victim = watcher.clone();
        let killer = Monitor::new(&ctx, "killer", move || {
            if killer_src.get() > 0 {
                victim.dispose();
            }
            Ok(())
        });
        killer.activate().unwrap();

        let _batch = crate::reactive::BatchScope::new(&ctx);
        source.set(1);
        drop(_batch);

        assert!(watcher.run_count() <= 2);
        source.set(2);
        assert!(watcher.run_count() <= 2);
        assert!(watcher.is_disposed());
    }
}
