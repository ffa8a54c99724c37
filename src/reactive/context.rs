//! The explicit execution context that owns the observable/monitor graph.
//!
//! Every [`Observable`](super::Observable) and [`Monitor`](super::Monitor)
//! belongs to exactly one `ReactiveContext`. The context records which
//! monitor is currently running, so `Observable::get()` knows whom to credit
//! the read to without any thread-local state.
//!
//! # Scheduling
//!
//! A write bumps the observable's version and queues every monitor that read
//! it. The queue is drained immediately unless a monitor run or a
//! [`BatchScope`](super::BatchScope) is in progress, in which case it drains
//! when the outermost one finishes. A queued monitor only runs if one of its
//! recorded versions is actually out of date.
//!
//! The context is `!Send`. Asynchronous work that must touch observables is
//! started through [`ReactiveContext::spawn`], which queues it on a tokio
//! `LocalSet` owned by the context. That work only makes progress while the
//! owner drives the context with [`ReactiveContext::run_until`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use tokio::task::{JoinHandle, LocalSet};

use crate::error::{KeySyncError, KeySyncResult, ReactiveError};

/// Upper bound on monitor runs in one drain of the queue. Hitting it means
/// two monitors keep invalidating each other.
const MAX_RUNS_PER_FLUSH: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ObservableId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct MonitorId(u64);

pub(crate) enum RunOutcome {
    /// Stay subscribed to whatever the run read.
    Continue,
    /// Dispose after this run.
    Finished,
}

pub(crate) type MonitorBody = Box<dyn FnMut() -> KeySyncResult<RunOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorState {
    Idle,
    Active,
    Disposed,
}

/// State shared between a monitor handle and its graph slot.
pub(crate) struct MonitorShared {
    pub(crate) id: MonitorId,
    pub(crate) name: String,
    pub(crate) state: Cell<MonitorState>,
    pub(crate) runs: Cell<u64>,
    pub(crate) body: RefCell<MonitorBody>,
}

struct MonitorSlot {
    shared: Rc<MonitorShared>,
    deps: HashMap<ObservableId, u64>,
}

#[derive(Default)]
struct Graph {
    versions: HashMap<ObservableId, u64>,
    dependents: HashMap<ObservableId, BTreeSet<MonitorId>>,
    monitors: HashMap<MonitorId, MonitorSlot>,
}

struct Frame {
    reads: HashMap<ObservableId, u64>,
}

/// A scheduled rerun that returned an error.
#[derive(Debug)]
pub struct MonitorFailure {
    pub monitor: String,
    pub error: KeySyncError,
}

pub(crate) struct ContextInner {
    graph: RefCell<Graph>,
    next_id: Cell<u64>,
    recording: RefCell<Vec<Frame>>,
    pending: RefCell<VecDeque<MonitorId>>,
    batch_depth: Cell<u32>,
    flushing: Cell<bool>,
    failures: RefCell<Vec<MonitorFailure>>,
    local: LocalSet,
}

/// Handle to a monitor graph. Cloning shares the same graph.
#[derive(Clone)]
pub struct ReactiveContext {
    inner: Rc<ContextInner>,
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("active_monitors", &self.active_monitors())
            .field("observables", &self.observable_count())
            .finish()
    }
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                graph: RefCell::new(Graph::default()),
                next_id: Cell::new(1),
                recording: RefCell::new(Vec::new()),
                pending: RefCell::new(VecDeque::new()),
                batch_depth: Cell::new(0),
                flushing: Cell::new(false),
                failures: RefCell::new(Vec::new()),
                local: LocalSet::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn inner(&self) -> &ContextInner {
        &self.inner
    }

    /// Number of monitors currently subscribed in this graph.
    ///
    /// A component that has been stopped should contribute zero; anything
    /// left over is a leaked monitor.
    pub fn active_monitors(&self) -> usize {
        self.inner.graph.borrow().monitors.len()
    }

    pub fn observable_count(&self) -> usize {
        self.inner.graph.borrow().versions.len()
    }

    /// Drain the errors returned by monitor reruns since the last call.
    ///
    /// Reruns are triggered by writes, whose callers cannot be handed the
    /// error directly; they are logged and parked here instead.
    pub fn take_failures(&self) -> Vec<MonitorFailure> {
        std::mem::take(&mut *self.inner.failures.borrow_mut())
    }

    /// Queue `future` on this context's thread.
    ///
    /// Completions of directory fetches and other I/O must come back through
    /// here so they never touch observables from another thread. The task
    /// runs once the context is driven by [`run_until`](Self::run_until);
    /// until then it just waits.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.inner.local.spawn_local(future)
    }

    /// Drive `future` together with every task queued by [`spawn`](Self::spawn).
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        self.inner.local.run_until(future).await
    }
}

/// Restores the run bookkeeping when a monitor body unwinds.
struct RunGuard<'a> {
    inner: &'a ContextInner,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.inner.recording.borrow_mut().pop();
        // No flush while unwinding; the next write drains what is queued.
        self.inner
            .batch_depth
            .set(self.inner.batch_depth.get().saturating_sub(1));
    }
}

/// Clears the flushing flag however the drain ends.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ContextInner {
    fn next_raw_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn register_observable(&self) -> ObservableId {
        let id = ObservableId(self.next_raw_id());
        self.graph.borrow_mut().versions.insert(id, 0);
        id
    }

    pub(crate) fn unregister_observable(&self, id: ObservableId) {
        // May be reached from a drop inside a graph mutation; leaving the
        // entry behind is harmless because nothing can bump it again.
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            graph.versions.remove(&id);
            graph.dependents.remove(&id);
        }
    }

    pub(crate) fn version_of(&self, id: ObservableId) -> u64 {
        self.graph
            .borrow()
            .versions
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// Credit a read of `id` to the innermost running monitor.
    pub(crate) fn record_read(&self, id: ObservableId) {
        let version = self.version_of(id);
        if let Some(frame) = self.recording.borrow_mut().last_mut() {
            frame.reads.insert(id, version);
        }
    }

    pub(crate) fn mark_dirty(&self, id: ObservableId) {
        let dependents: Vec<MonitorId> = {
            let mut graph = self.graph.borrow_mut();
            *graph.versions.entry(id).or_insert(0) += 1;
            graph
                .dependents
                .get(&id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };
        self.enqueue(dependents);
        self.flush_if_idle();
    }

    fn enqueue(&self, monitors: impl IntoIterator<Item = MonitorId>) {
        let mut pending = self.pending.borrow_mut();
        for monitor in monitors {
            if !pending.contains(&monitor) {
                pending.push_back(monitor);
            }
        }
    }

    pub(crate) fn enter_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    pub(crate) fn exit_batch(&self) {
        self.batch_depth.set(self.batch_depth.get().saturating_sub(1));
        self.flush_if_idle();
    }

    fn flush_if_idle(&self) {
        if self.batch_depth.get() == 0 && !self.flushing.get() {
            self.flush();
        }
    }

    fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let _flushing = FlushGuard(&self.flushing);

        let mut runs = 0usize;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(id) = next else {
                break;
            };
            if !self.is_stale(id) {
                continue;
            }

            runs += 1;
            if runs > MAX_RUNS_PER_FLUSH {
                tracing::error!(
                    pending = self.pending.borrow().len(),
                    "monitor graph did not settle; dropping remaining reruns"
                );
                self.pending.borrow_mut().clear();
                break;
            }

            let name = self
                .graph
                .borrow()
                .monitors
                .get(&id)
                .map(|slot| slot.shared.name.clone())
                .unwrap_or_default();
            if let Err(error) = self.run_monitor(id) {
                tracing::warn!(
                    monitor = %name,
                    code = error.error_code(),
                    category = %error.category(),
                    retryable = error.is_retryable(),
                    error = %error,
                    "monitor rerun failed"
                );
                self.failures
                    .borrow_mut()
                    .push(MonitorFailure { monitor: name, error });
            }
        }
    }

    fn is_stale(&self, id: MonitorId) -> bool {
        let graph = self.graph.borrow();
        let Some(slot) = graph.monitors.get(&id) else {
            return false;
        };
        slot.deps
            .iter()
            .any(|(obs, seen)| graph.versions.get(obs).is_some_and(|now| now != seen))
    }

    pub(crate) fn activate(&self, shared: &Rc<MonitorShared>) -> KeySyncResult<()> {
        if shared.state.get() != MonitorState::Idle {
            return Ok(());
        }
        shared.state.set(MonitorState::Active);
        self.graph.borrow_mut().monitors.insert(
            shared.id,
            MonitorSlot {
                shared: Rc::clone(shared),
                deps: HashMap::new(),
            },
        );
        self.run_monitor(shared.id)
    }

    fn run_monitor(&self, id: MonitorId) -> KeySyncResult<()> {
        let shared = match self.graph.borrow().monitors.get(&id) {
            Some(slot) => Rc::clone(&slot.shared),
            None => return Ok(()),
        };
        if shared.state.get() != MonitorState::Active {
            return Ok(());
        }
        let Ok(mut body) = shared.body.try_borrow_mut() else {
            return Err(ReactiveError::ReentrantRun {
                monitor: shared.name.clone(),
            }
            .into());
        };

        self.enter_batch();
        self.recording.borrow_mut().push(Frame {
            reads: HashMap::new(),
        });
        let mut guard = RunGuard {
            inner: self,
            armed: true,
        };

        let result = (&mut **body)();

        guard.armed = false;
        drop(guard);
        drop(body);
        let frame = self.recording.borrow_mut().pop();
        shared.runs.set(shared.runs.get() + 1);
        if let Some(frame) = frame {
            self.commit(id, frame.reads);
        }

        let result = match result {
            Ok(RunOutcome::Finished) => {
                self.dispose(id);
                Ok(())
            }
            Ok(RunOutcome::Continue) => Ok(()),
            // Dependencies read before the failure stay recorded.
            Err(err) => Err(err),
        };

        self.exit_batch();
        result
    }

    /// Replace the monitor's dependency set with what the last run read.
    fn commit(&self, id: MonitorId, reads: HashMap<ObservableId, u64>) {
        let stale = {
            let mut graph = self.graph.borrow_mut();
            let Graph {
                versions,
                dependents,
                monitors,
            } = &mut *graph;
            let Some(slot) = monitors.get_mut(&id) else {
                return;
            };
            if slot.shared.state.get() != MonitorState::Active {
                return;
            }

            for old in slot.deps.keys() {
                if !reads.contains_key(old) {
                    if let Some(set) = dependents.get_mut(old) {
                        set.remove(&id);
                    }
                }
            }
            for obs in reads.keys() {
                dependents.entry(*obs).or_default().insert(id);
            }
            let stale = reads
                .iter()
                .any(|(obs, seen)| versions.get(obs).is_some_and(|now| now != seen));
            slot.deps = reads;
            stale
        };

        // A write that landed after the read but before subscription would
        // otherwise be missed.
        if stale {
            self.enqueue([id]);
        }
    }

    pub(crate) fn dispose(&self, id: MonitorId) {
        let slot = {
            let mut graph = self.graph.borrow_mut();
            let slot = graph.monitors.remove(&id);
            if let Some(ref slot) = slot {
                for obs in slot.deps.keys() {
                    if let Some(set) = graph.dependents.get_mut(obs) {
                        set.remove(&id);
                    }
                }
            }
            slot
        };
        self.pending.borrow_mut().retain(|pending| *pending != id);
        if let Some(slot) = slot {
            slot.shared.state.set(MonitorState::Disposed);
        }
    }

    pub(crate) fn new_monitor(&self, name: String, body: MonitorBody) -> Rc<MonitorShared> {
        Rc::new(MonitorShared {
            id: MonitorId(self.next_raw_id()),
            name,
            state: Cell::new(MonitorState::Idle),
            runs: Cell::new(0),
            body: RefCell::new(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Monitor, Observable};

    #[test]
    fn test_observable_registration_is_tracked() {
        let ctx = ReactiveContext::new();
        let a = Observable::new(&ctx, 1);
        assert_eq!(ctx.observable_count(), 1);
        drop(a);
        assert_eq!(ctx.observable_count(), 0);
    }

    #[test]
    fn test_failed_rerun_is_parked() {
        let ctx = ReactiveContext::new();
        let source = Observable::new(&ctx, 0);

        let src = source.clone();
        let monitor = Monitor::new(&ctx, "fails-on-odd", move || {
            if src.get() % 2 == 1 {
                return Err(ReactiveError::ContextDropped {
                    monitor: "fails-on-odd".to_string(),
                }
                .into());
            }
            Ok(())
        });
        monitor.activate().unwrap();

        source.set(1);
        let failures = ctx.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].monitor, "fails-on-odd");
        assert!(ctx.take_failures().is_empty());

        // Dependencies read before the failure are kept.
        source.set(2);
        assert_eq!(monitor.run_count(), 3);
    }

    #[test]
    fn test_panicking_body_leaves_graph_usable() {
        let ctx = ReactiveContext::new();
        let trigger = Observable::new(&ctx, 0);
        let other = Observable::new(&ctx, 0);

        let t = trigger.clone();
        let panicking = Monitor::new(&ctx, "panics-on-one", move || {
            if t.get() == 1 {
                panic!("monitor body failed");
            }
            Ok(())
        });
        panicking.activate().unwrap();

        let o = other.clone();
        let healthy = Monitor::new(&ctx, "healthy", move || {
            o.get();
            Ok(())
        });
        healthy.activate().unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| trigger.set(1)));
        assert!(result.is_err());

        other.set(1);
        assert_eq!(healthy.run_count(), 2);
        other.set(2);
        assert_eq!(healthy.run_count(), 3);
    }

    #[test]
    fn test_spawn_waits_for_driver() {
        let ctx = ReactiveContext::new();
        let value = Observable::new(&ctx, 0);

        let v = value.clone();
        drop(ctx.spawn(async move {
            v.set(5);
        }));
        assert_eq!(value.peek(), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(ctx.run_until(async {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
        }));
        assert_eq!(value.peek(), 5);
    }

    #[test]
    fn test_write_during_first_run_is_not_missed() {
        let ctx = ReactiveContext::new();
        let counter = Observable::new(&ctx, 0);

        let c = counter.clone();
        let monitor = Monitor::new(&ctx, "bump-once", move || {
            if c.get() == 0 {
                c.set(1);
            }
            Ok(())
        });
        monitor.activate().unwrap();

        assert_eq!(counter.peek(), 1);
        assert_eq!(monitor.run_count(), 2);
    }
}
