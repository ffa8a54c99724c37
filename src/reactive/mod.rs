#![forbid(unsafe_code)]

//! Reactive observable-dependency engine.
//!
//! - [`Existence`] / [`Tracked`]: tri-state marker for asynchronously
//!   arriving values.
//! - [`Observable`]: a shared, version-tracked value.
//! - [`Monitor`]: a computation that reruns when anything it read changes.
//! - [`OneShotMonitor`]: reruns a predicate until it returns true.
//! - [`BatchScope`]: defers reruns until the outermost scope exits.
//!
//! # Architecture
//!
//! The graph is bipartite (observables ↔ monitors) and lives in an explicit
//! [`ReactiveContext`]. Each observable has a version counter; each monitor
//! keeps the version of every observable it read in its last run.
//! Everything is `Rc<RefCell<..>>` and single-threaded.
//!
//! # Invariants
//!
//! 1. A monitor reruns iff a recorded version is out of date, or on its
//!    first activation.
//! 2. Dependencies are recomputed on every run; reads from older runs are
//!    dropped.
//! 3. A disposed monitor's body is never invoked again.
//! 4. A one-shot monitor has at most one run that returns true, and none
//!    after it.
//! 5. Runs of one monitor never overlap.
//!
//! # Failure Modes
//!
//! - Two monitors that write what the other reads never settle; the drain
//!   gives up after a fixed number of runs and logs an error.
//! - A body error during activation is returned; during a rerun it is
//!   parked in [`ReactiveContext::take_failures`].

pub mod batch;
pub mod context;
pub mod existence;
pub mod monitor;
pub mod observable;
pub mod one_shot;

pub use batch::BatchScope;
pub use context::{MonitorFailure, ReactiveContext};
pub use existence::{Existence, Tracked};
pub use monitor::Monitor;
pub use observable::Observable;
pub use one_shot::OneShotMonitor;
