/// Error taxonomy, per the spec's two-tier propagation policy (§7):
/// capacity/lookup failures are ordinary `Result`s; programming errors and
/// deadlocks are fatal and never return.

use core::fmt;

/// [`crate::thread::join`] was given an id that does not name a
/// currently-`Running` thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownThread(pub u32);

impl fmt::Display for UnknownThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no running thread with id {}", self.0)
    }
}

/// Fatal conditions: self-join, a second concurrent `join(0)`, a semaphore
/// wait or exit with no runnable successor (deadlock). These halt the
/// process; the library is not defensive against misuse, matching the
/// original's `threadsafe_assert`.
///
/// Grounded on the original's `threadsafe_assert` macro, which sets the
/// reentrancy flag around the host `assert()` expansion so the preemption
/// handler cannot fire mid-diagnostic. `kernel_fatal!` does the same with
/// [`crate::monitor::non_reentrant`].
#[macro_export]
macro_rules! kernel_fatal {
    ($($arg:tt)*) => {{
        $crate::monitor::non_reentrant(|| {
            log::error!($($arg)*);
        });
        panic!($($arg)*)
    }};
}
