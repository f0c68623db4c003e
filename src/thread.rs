/// The thread table (C5) and the lifecycle operations built on top of it
/// (C7): `init`, `spawn`, `exit`, `current`, `pause`, `join`.
///
/// Grounded on `thread.c`/`thread.h`'s `Thread_init`/`Thread_new`/
/// `Thread_exit`/`Thread_self`/`Thread_pause`/`Thread_join` and their shared
/// `struct thread` table, with the table itself laid out the way the
/// teacher lays out its own fixed-capacity kernel tables (`task::scheduler`'s
/// ready queue, `memory`'s frame allocator bitmap): a single statically
/// sized array behind one global, no heap growth.
use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_THREADS;
use crate::context::{self, Context, EntryFn, Stack};
use crate::error::UnknownThread;
use crate::kernel_fatal;
use crate::monitor::MonitorGuard;

static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(1);

fn next_thread_id() -> u32 {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// A thread's identity. Distinct namespace from [`crate::sem::Semaphore`]
/// ids (§3): both are monotonic counters, but neither is ever compared
/// against the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(u32);

impl ThreadId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who [`join`] should wait for (§4.3's `tid` parameter, with `0` broken
/// out into its own variant so "wait for the last thread standing" can't be
/// confused with a real id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTarget {
    Peer(ThreadId),
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Invalid,
    Running,
    WaitAtJoin(JoinTarget),
    WaitForSem(u32),
}

pub(crate) struct Slot {
    id: u32,
    pub(crate) state: State,
    ctx: Option<Context>,
    stack: Option<Stack>,
    returned_value: i32,
}

impl Slot {
    const fn invalid() -> Self {
        Slot {
            id: 0,
            state: State::Invalid,
            ctx: None,
            stack: None,
            returned_value: 0,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) slots: [Slot; MAX_THREADS],
    pub(crate) current: usize,
    pending_free: Option<usize>,
    existing_threads: u32,
    waiting_for_zero: u32,
    rr_cursor: usize,
}

impl Inner {
    const fn new() -> Self {
        Inner {
            // `Slot` owns a `Box`-backed stack and isn't `Copy`; an inline
            // const repeat element sidesteps that instead of unrolling
            // `MAX_THREADS` literal entries by hand.
            slots: [const { Slot::invalid() }; MAX_THREADS],
            current: 0,
            pending_free: None,
            existing_threads: 0,
            waiting_for_zero: 0,
            rr_cursor: 0,
        }
    }

    /// §4.1: scan forward from the cursor for a `Running` slot, wrapping
    /// once, and leave the cursor just past whatever it finds so the next
    /// scan continues round-robin instead of restarting from zero.
    pub(crate) fn select_runnable(&mut self) -> Option<usize> {
        for step in 0..MAX_THREADS {
            let idx = (self.rr_cursor + step) % MAX_THREADS;
            if self.slots[idx].state == State::Running {
                self.rr_cursor = (idx + 1) % MAX_THREADS;
                return Some(idx);
            }
        }
        None
    }

    fn exists_running(&self, id: u32) -> bool {
        self.slots
            .iter()
            .any(|s| s.id == id && s.state == State::Running)
    }
}

pub(crate) struct ThreadPool {
    inner: UnsafeCell<Inner>,
}

// `Inner` is mutated only with a `MonitorGuard` held, which on real
// hardware means "preemption is masked" and in the host simulation means
// "exactly one simulated thread is unparked at a time" — never two
// execution contexts touching it concurrently.
unsafe impl Sync for ThreadPool {}

impl ThreadPool {
    const fn new() -> Self {
        ThreadPool {
            inner: UnsafeCell::new(Inner::new()),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) fn inner(&self) -> &mut Inner {
        unsafe { &mut *self.inner.get() }
    }
}

pub(crate) static THREADS: ThreadPool = ThreadPool::new();

/// Disjoint mutable/shared borrows of two different slots, for the one
/// moment a switch genuinely needs both at once. `from` and `to` must
/// differ; the round-robin self-switch case is handled by its callers
/// before this is ever reached.
pub(crate) fn split_contexts(inner: &mut Inner, from: usize, to: usize) -> (&mut Context, &Context) {
    debug_assert_ne!(from, to);
    if from < to {
        let (left, right) = inner.slots.split_at_mut(to);
        (left[from].ctx.as_mut().unwrap(), right[0].ctx.as_ref().unwrap())
    } else {
        let (left, right) = inner.slots.split_at_mut(from);
        (right[0].ctx.as_mut().unwrap(), left[to].ctx.as_ref().unwrap())
    }
}

/// §4.3 / C7: (re)initialize the table with a single `Running` bootstrap
/// thread — the caller's own execution context. Calling this more than
/// once, or from any thread other than the one that will become the
/// bootstrap thread, has unspecified effect, same as the original.
pub fn init() {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();

    for slot in inner.slots.iter_mut() {
        *slot = Slot::invalid();
    }
    inner.pending_free = None;
    inner.waiting_for_zero = 0;
    inner.rr_cursor = 0;

    let id = next_thread_id();
    inner.slots[0] = Slot {
        id,
        state: State::Running,
        ctx: Some(unsafe { context::bootstrap() }),
        stack: None,
        returned_value: 0,
    };
    inner.current = 0;
    inner.existing_threads = 1;

    log::debug!("thread pool initialized, bootstrap thread id={}", id);
}

/// §4.3: spawn a thread with the default stack size ([`crate::config::STACK_SIZE`]).
pub fn spawn(entry: EntryFn, args: *mut u8, nbytes: usize) -> Option<ThreadId> {
    spawn_with_stack(entry, args, nbytes, crate::config::STACK_SIZE)
}

/// §4.3: spawn a thread with an explicit stack size. Reuses the slot's
/// previous stack allocation if one is still attached (a slot whose stack
/// has not yet been released through the one-deep [`exit`] deferral), the
/// same shortcut `Thread_new` takes when `thread_descriptor->stack` is
/// still non-null.
pub fn spawn_with_stack(entry: EntryFn, args: *mut u8, nbytes: usize, stack_bytes: usize) -> Option<ThreadId> {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();

    let idx = inner.slots.iter().position(|s| s.state == State::Invalid)?;

    let id = next_thread_id();
    let mut stack = inner.slots[idx].stack.take().unwrap_or_else(|| Stack::new(stack_bytes));
    let ctx = unsafe { context::spawn(&mut stack, entry, args, nbytes) };

    inner.slots[idx] = Slot {
        id,
        state: State::Running,
        ctx: Some(ctx),
        stack: Some(stack),
        returned_value: 0,
    };
    inner.existing_threads += 1;

    log::trace!("spawned thread id={} in slot {}", id, idx);
    Some(ThreadId(id))
}

/// §4.3: the caller's own id.
pub fn current() -> ThreadId {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();
    ThreadId(inner.slots[inner.current].id)
}

/// §4.3: voluntarily give up the processor to the next runnable thread in
/// round-robin order, which may be the caller itself if no other thread is
/// `Running`.
pub fn pause() {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();
    let current = inner.current;

    let next = match inner.select_runnable() {
        Some(n) => n,
        None => kernel_fatal!("pause: no runnable thread found (the caller itself is Running, this should be impossible)"),
    };

    if next == current {
        return;
    }

    inner.current = next;
    let (from, to) = split_contexts(inner, current, next);
    drop(_g);
    unsafe { context::switch(from, to) };
}

/// The trampoline's implicit call when a thread's entry function returns,
/// and the target of a thread's own explicit `exit` call — both paths
/// converge here (§4.3/§5).
pub(crate) fn exit_from_trampoline(rc: i32) -> ! {
    exit(rc)
}

/// §4.3: terminate the calling thread with return value `rc`, waking a
/// peer waiting on this id (or on "last thread standing") if one exists,
/// then switch away. Never returns. Fatal if no other thread is runnable
/// and more than one thread remains un-joined — that is a deadlock, not a
/// recoverable condition.
pub fn exit(rc: i32) -> ! {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();

    // One-deep deferred stack release: the thread that exited *before*
    // this one left its stack allocated because it could not free the
    // memory it was still running on. Free it now, from an unrelated
    // thread's context.
    if let Some(idx) = inner.pending_free.take() {
        inner.slots[idx].stack = None;
    }

    let current = inner.current;
    let exited_id = inner.slots[current].id;
    inner.slots[current].state = State::Invalid;
    inner.existing_threads -= 1;

    for slot in inner.slots.iter_mut() {
        if let State::WaitAtJoin(JoinTarget::Peer(pid)) = slot.state {
            if pid.0 == exited_id {
                slot.returned_value = rc;
                slot.state = State::Running;
            }
        }
    }

    match inner.select_runnable() {
        Some(next) if next != current => {
            inner.pending_free = Some(current);
            inner.current = next;
            let (from, to) = split_contexts(inner, current, next);
            drop(_g);
            unsafe { context::switch(from, to) };
            unreachable!("an exited thread's slot is never switched back into");
        }
        Some(_) => unreachable!("the exiting slot just went Invalid, it cannot be selected again"),
        None if inner.existing_threads == 0 => {
            log::info!("last thread exited, rc={}", rc);
            drop(_g);
            host_exit(rc);
        }
        None if inner.existing_threads == 1 => {
            let waiter = inner
                .slots
                .iter()
                .position(|s| matches!(s.state, State::WaitAtJoin(JoinTarget::Last)));
            match waiter {
                Some(next) => {
                    inner.waiting_for_zero -= 1;
                    inner.slots[next].returned_value = 0;
                    inner.slots[next].state = State::Running;
                    inner.pending_free = Some(current);
                    inner.current = next;
                    let (from, to) = split_contexts(inner, current, next);
                    drop(_g);
                    unsafe { context::switch(from, to) };
                    unreachable!("an exited thread's slot is never switched back into");
                }
                None => kernel_fatal!("deadlock: one thread remains but nobody has joined on 0"),
            }
        }
        None => kernel_fatal!(
            "deadlock: no runnable thread with {} threads still outstanding",
            inner.existing_threads
        ),
    }
}

fn host_exit(rc: i32) -> ! {
    #[cfg(any(test, feature = "std-shim"))]
    {
        std::process::exit(rc);
    }
    #[cfg(not(any(test, feature = "std-shim")))]
    {
        let _ = rc;
        loop {
            #[cfg(target_arch = "arm")]
            cortex_m::asm::wfi();
        }
    }
}

/// §4.3: block until the thread named by `target` exits (or, for
/// [`JoinTarget::Last`], until exactly one thread remains), returning its
/// exit code. `Err` only for an unknown/already-exited peer id — everything
/// else the original treats as programmer error is fatal here too:
/// joining yourself, or a second concurrent `join` on `Last`.
pub fn join(target: JoinTarget) -> Result<i32, UnknownThread> {
    let _g = MonitorGuard::enter();
    let inner = THREADS.inner();
    let current = inner.current;
    let self_id = inner.slots[current].id;

    if let JoinTarget::Peer(tid) = target {
        if tid.0 == self_id {
            kernel_fatal!("join: thread {} cannot join itself", self_id);
        }
        if !inner.exists_running(tid.0) {
            return Err(UnknownThread(tid.0));
        }
    }

    if target == JoinTarget::Last {
        if inner.existing_threads == 1 {
            return Ok(0);
        }
        if inner.waiting_for_zero > 0 {
            kernel_fatal!("join(0): another thread is already waiting for the last thread standing");
        }
        inner.waiting_for_zero += 1;
    }

    inner.slots[current].state = State::WaitAtJoin(target);

    let next = match inner.select_runnable() {
        Some(n) => n,
        None => kernel_fatal!("join: deadlock, no runnable thread to switch to"),
    };
    if next == current {
        unreachable!("a thread that just went WaitAtJoin cannot be selected as runnable");
    }

    inner.current = next;
    let (from, to) = split_contexts(inner, current, next);
    drop(_g);
    unsafe { context::switch(from, to) };

    let _g2 = MonitorGuard::enter();
    let inner = THREADS.inner();
    Ok(inner.slots[current].returned_value)
}
