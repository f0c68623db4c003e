/// The tick-driven half of C6: the preemption handler and the external
/// periodic-tick contract (C1). Round-robin selection itself
/// (`Inner::select_runnable`) lives in [`crate::thread`] next to the table
/// it scans; this module owns only the part that is genuinely about
/// *scheduling on a timer* rather than table bookkeeping.
///
/// Grounded on the original's `timer_handler`/`set_preemption_timer` pair —
/// a periodic interrupt that, if the interrupted PC falls outside the
/// monitor region, calls the same yield path `Thread_pause` uses — and on
/// the teacher's `task::scheduler::Scheduler`, which likewise separates
/// "pick the next task" from "the thing that calls it on a timer tick".
use crate::{config, monitor, thread};

/// What the preemption handler is told about the interrupted context.
/// `interrupted_pc` no longer gates anything directly — see DESIGN.md's
/// note on the monitor-region redesign — but is kept for diagnostics, the
/// same role it plays in the original's handler.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub interrupted_pc: usize,
}

/// A periodic hardware timer the embedding firmware owns and configures
/// (§1/§6, C1). This crate only needs "call `on_tick` every `period_us`
/// microseconds"; wiring an actual peripheral (SysTick, a Due `DueTimer`-
/// style channel, whatever the target board exposes) is out of scope.
pub trait TickSource {
    fn start(&mut self, period_us: u32, handler: fn(TickContext));
}

/// §4.2: the preemption handler. Runs in interrupt context on real
/// hardware. Defers to the next tick whenever a core operation or a
/// non-reentrant host call is in flight; otherwise this is exactly
/// [`crate::thread::pause`] called on the interrupted thread's behalf.
pub fn on_tick(ctx: TickContext) {
    if !monitor::preemption_allowed() {
        // The original's `timer_handler` just returns here, silently —
        // logging would re-enter whatever non-reentrant host call (or
        // monitor region) the interrupted thread is in the middle of.
        let _ = ctx.interrupted_pc;
        return;
    }
    thread::pause();
}

/// Register [`on_tick`] on `source` at `period_us`.
pub fn start_preemption(source: &mut impl TickSource, period_us: u32) {
    source.start(period_us, on_tick);
}

/// [`start_preemption`] at the spec's baseline interval
/// ([`config::TICK_INTERVAL_US`]).
pub fn start_default_preemption(source: &mut impl TickSource) {
    start_preemption(source, config::TICK_INTERVAL_US);
}
