//! Deferred rerun scopes.

use super::context::ReactiveContext;

/// RAII guard that defers monitor reruns until the outermost scope exits.
///
/// Values are updated immediately; only the reruns wait. Nested scopes are
/// supported.
///
/// ```ignore
/// let _batch = BatchScope::new(&ctx);
/// setup_state.set(SetupState::SyncRequired);
/// passcode_state.set(Tracked::present(SyncPasscodeState::New));
/// // dependents rerun once, here
/// ```
#[must_use = "reruns are released when the scope is dropped"]
pub struct BatchScope {
    ctx: ReactiveContext,
}

impl BatchScope {
    pub fn new(ctx: &ReactiveContext) -> Self {
        ctx.inner().enter_batch();
        Self { ctx: ctx.clone() }
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        self.ctx.inner().exit_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Monitor, Observable};

    #[test]
    fn test_batched_writes_cause_one_rerun() {
        let ctx = ReactiveContext::new();
        let a = Observable::new(&ctx, 0);
        let b = Observable::new(&ctx, 0);

        let (a2, b2) = (a.clone(), b.clone());
        let monitor = Monitor::new(&ctx, "sum", move || {
            let _ = a2.get() + b2.get();
            Ok(())
        });
        monitor.activate().unwrap();

        {
            let _outer = BatchScope::new(&ctx);
            a.set(1);
            {
                let _inner = BatchScope::new(&ctx);
                b.set(1);
            }
            assert_eq!(monitor.run_count(), 1);
        }
        assert_eq!(monitor.run_count(), 2);
    }
}
