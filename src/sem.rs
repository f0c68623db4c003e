/// Counting semaphores (C8), built on the same table and selection logic
/// as [`crate::thread`].
///
/// Grounded on `sem.h`'s `Sem_init`/`Sem_wait`/`Sem_signal`: a plain
/// (non-atomic) counter protected entirely by the monitor region, signal
/// wakes every waiter rather than picking one, and each woken waiter
/// retests the count itself rather than trusting it was reserved for them.
/// That thundering-herd-then-retest behavior is kept exactly; it is not
/// FIFO-fair, and callers that need fairness must layer it on themselves
/// (§4.4, Non-goals).
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::kernel_fatal;
use crate::monitor::MonitorGuard;
use crate::thread::THREADS;

static NEXT_SEM_ID: AtomicU32 = AtomicU32::new(1);

fn next_sem_id() -> u32 {
    NEXT_SEM_ID.fetch_add(1, Ordering::Relaxed)
}

/// A counting semaphore. Declare as a `static` and call [`init`](Self::init)
/// once at startup, the same two-phase lifecycle `Sem_T`/`Sem_init` have:
/// the storage itself is a compile-time constant, the id and count are
/// assigned at runtime.
pub struct Semaphore {
    id: AtomicU32,
    count: UnsafeCell<i32>,
}

// Mutated only with a `MonitorGuard` held, same discipline as `ThreadPool`.
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const fn new() -> Self {
        Semaphore {
            id: AtomicU32::new(0),
            count: UnsafeCell::new(0),
        }
    }

    /// §4.4: assign a fresh id and set the initial count. Calling this more
    /// than once on the same semaphore reassigns its id, which means any
    /// thread already blocked on the old id will never be woken by the new
    /// one — matches the original, which has no notion of re-initializing
    /// a semaphore in use.
    pub fn init(&self, count: i32) {
        let _g = MonitorGuard::enter();
        self.id.store(next_sem_id(), Ordering::Release);
        unsafe {
            *self.count.get() = count;
        }
    }

    /// Current count, for diagnostics and the conservation property in
    /// §8 (`final_count == c + S - W` across any finite run of signals and
    /// successful waits). Not part of the original's surface — it has no
    /// `Sem_count` — but a harmless read of state the original stores in
    /// plain sight on the struct, and useful to assert against in tests.
    pub fn count(&self) -> i32 {
        let _g = MonitorGuard::enter();
        unsafe { *self.count.get() }
    }

    /// §4.4: decrement the count if positive; otherwise block until a
    /// [`signal`](Self::signal) wakes this thread, then retest from
    /// scratch (another waiter may have already taken the unit).
    pub fn wait(&self) {
        loop {
            let _g = MonitorGuard::enter();
            let acquired = unsafe {
                let count = *self.count.get();
                if count > 0 {
                    *self.count.get() = count - 1;
                    true
                } else {
                    false
                }
            };
            if acquired {
                return;
            }

            let inner = THREADS.inner();
            let current = inner.current;
            inner.slots[current].state = crate::thread::State::WaitForSem(self.id.load(Ordering::Acquire));

            let next = match inner.select_runnable() {
                Some(n) => n,
                None => kernel_fatal!("sem wait: deadlock, no runnable thread to switch to"),
            };
            if next == current {
                unreachable!("a thread that just went WaitForSem cannot be selected as runnable");
            }

            inner.current = next;
            let (from, to) = crate::thread::split_contexts(inner, current, next);
            drop(_g);
            unsafe { crate::context::switch(from, to) };
            // Resumed by a signal; loop around and retest the count.
        }
    }

    /// §4.4: increment the count, then wake every thread blocked on this
    /// semaphore so each can retest [`wait`](Self::wait)'s condition.
    pub fn signal(&self) {
        let _g = MonitorGuard::enter();
        unsafe {
            *self.count.get() += 1;
        }
        let id = self.id.load(Ordering::Acquire);
        let inner = THREADS.inner();
        for slot in inner.slots.iter_mut() {
            if let crate::thread::State::WaitForSem(sid) = slot.state {
                if sid == id {
                    slot.state = crate::thread::State::Running;
                }
            }
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
