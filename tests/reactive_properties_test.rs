//! Integration tests for the observable/monitor engine.

use std::cell::Cell;
use std::rc::Rc;

use keysync::reactive::{BatchScope, Monitor, Observable, OneShotMonitor, ReactiveContext};

// =============================================================================
// Disposal
// =============================================================================

#[test]
fn test_disposed_monitor_never_runs_again() {
    let ctx = ReactiveContext::new();
    let a = Observable::new(&ctx, 0u32);
    let b = Observable::new(&ctx, String::new());

    let (ra, rb) = (a.clone(), b.clone());
    let monitor = Monitor::new(&ctx, "reader", move || {
        if ra.get() % 2 == 0 {
            rb.get();
        }
        Ok(())
    });
    monitor.activate().unwrap();
    a.set(2);
    monitor.dispose();
    let frozen = monitor.run_count();

    for i in 0..50u32 {
        match i % 3 {
            0 => {
                a.set(i);
            }
            1 => b.update(|s| s.push('x')),
            _ => {
                let _batch = BatchScope::new(&ctx);
                a.mark_dirty();
                b.mark_dirty();
            }
        }
    }

    assert_eq!(monitor.run_count(), frozen);
    assert_eq!(ctx.active_monitors(), 0);
}

#[test]
fn test_dispose_from_inside_own_run() {
    let ctx = ReactiveContext::new();
    let source = Observable::new(&ctx, 0);
    let handle: Rc<Cell<Option<Monitor>>> = Rc::new(Cell::new(None));

    let (src, slot) = (source.clone(), Rc::clone(&handle));
    let monitor = Monitor::new(&ctx, "self-disposing", move || {
        if src.get() >= 3 {
            if let Some(me) = slot.take() {
                me.dispose();
            }
        }
        Ok(())
    });
    handle.set(Some(monitor.clone()));
    monitor.activate().unwrap();

    for i in 1..10 {
        source.set(i);
    }
    assert_eq!(monitor.run_count(), 4);
    assert!(monitor.is_disposed());
}

// =============================================================================
// One-shot monitors
// =============================================================================

#[test]
fn test_one_shot_runs_exactly_n_times() {
    for n in 1..6u32 {
        let ctx = ReactiveContext::new();
        let attempt = Observable::new(&ctx, 1u32);

        let a = attempt.clone();
        let one_shot = OneShotMonitor::run(&ctx, "until-n", move || a.get() >= n);
        for i in 2..=20 {
            attempt.set(i);
        }

        assert!(one_shot.is_finished());
        assert_eq!(one_shot.run_count(), u64::from(n));
    }
}

#[test]
fn test_batch_coalesces_reruns() {
    let ctx = ReactiveContext::new();
    let first = Observable::new(&ctx, 0);
    let second = Observable::new(&ctx, 0);

    let (f, s) = (first.clone(), second.clone());
    let monitor = Monitor::new(&ctx, "sum", move || {
        let _ = f.get() + s.get();
        Ok(())
    });
    monitor.activate().unwrap();

    {
        let _batch = BatchScope::new(&ctx);
        first.set(1);
        second.set(2);
        assert_eq!(monitor.run_count(), 1);
    }
    assert_eq!(monitor.run_count(), 2);
}

#[test]
fn test_flush_order_follows_writes() {
    let ctx = ReactiveContext::new();
    let trigger = Observable::new(&ctx, 0);
    let log = Rc::new(std::cell::RefCell::new(Vec::new()));

    let mut monitors = Vec::new();
    for name in ["first", "second", "third"] {
        let (t, l) = (trigger.clone(), Rc::clone(&log));
        let monitor = Monitor::new(&ctx, name, move || {
            if t.get() > 0 {
                l.borrow_mut().push(name);
            }
            Ok(())
        });
        monitor.activate().unwrap();
        monitors.push(monitor);
    }

    trigger.set(1);
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}
