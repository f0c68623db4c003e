/// Preemption gating: the reentrancy flag (C2) and the monitor region (C9).
///
/// The original pins the monitor region down with two link-order symbols,
/// `_STARTMONITOR`/`_ENDMONITOR`, and tests the interrupted PC against that
/// range. This crate takes the alternative the spec's Design Notes (§9)
/// explicitly sanction instead: a single atomic reentrancy-depth counter,
/// incremented on entry to every public core operation and decremented on
/// exit. The preemption handler defers whenever the counter is nonzero,
/// exactly as it would defer inside the PC range — no core operation can
/// ever be re-entered by its own preemption handler.
///
/// `REENTRANT_CALL` is the separate flag from C2/C9: it guards calls into
/// host library routines (the allocator, formatted logging) that are not
/// reentrant, the same way the original's `in_libc_flag` guards `malloc`,
/// `free`, `memcpy`, and `printf`.
use core::sync::atomic::{AtomicU32, Ordering};

static MONITOR_DEPTH: AtomicU32 = AtomicU32::new(0);
static REENTRANT_CALL: AtomicU32 = AtomicU32::new(0);

/// RAII guard marking "inside a core operation". Held for the duration of
/// every public `ThreadPool`/`Scheduler`/`Semaphore` method. Reentrant by
/// depth-counting: a core operation calling another core operation (e.g.
/// `exit` calling the same selection logic `pause` uses) nests correctly.
pub struct MonitorGuard(());

impl MonitorGuard {
    #[inline]
    pub fn enter() -> Self {
        MONITOR_DEPTH.fetch_add(1, Ordering::AcqRel);
        MonitorGuard(())
    }
}

impl Drop for MonitorGuard {
    #[inline]
    fn drop(&mut self) {
        MONITOR_DEPTH.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run `f` with the reentrancy flag set, the same contract C9's monitor
/// wrapper gives the allocator and formatted-output calls it wraps: the
/// preemption handler will not fire while `f` runs.
#[inline]
pub fn non_reentrant<R>(f: impl FnOnce() -> R) -> R {
    REENTRANT_CALL.fetch_add(1, Ordering::AcqRel);
    let r = f();
    REENTRANT_CALL.fetch_sub(1, Ordering::AcqRel);
    r
}

/// Whether the preemption handler may safely switch right now: neither
/// inside a core operation nor inside a non-reentrant host call.
#[inline]
pub fn preemption_allowed() -> bool {
    MONITOR_DEPTH.load(Ordering::Acquire) == 0 && REENTRANT_CALL.load(Ordering::Acquire) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_guards_defer_preemption_until_outermost_drops() {
        assert!(preemption_allowed());
        let outer = MonitorGuard::enter();
        assert!(!preemption_allowed());
        {
            let inner = MonitorGuard::enter();
            assert!(!preemption_allowed());
            drop(inner);
        }
        assert!(!preemption_allowed());
        drop(outer);
        assert!(preemption_allowed());
    }

    #[test]
    fn non_reentrant_call_defers_preemption_for_its_duration() {
        assert!(preemption_allowed());
        non_reentrant(|| {
            assert!(!preemption_allowed());
        });
        assert!(preemption_allowed());
    }
}
