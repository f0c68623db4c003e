/// Stack ownership (C5) and the context-switch primitive + trampoline
/// (C3/C4), the two pieces the spec specifies only by contract.
///
/// The real backend lays out a 14-word register frame at the top of a
/// freshly allocated stack — `r0..r12` plus `lr` — exactly matching the
/// original's `THRSTART_FRAME_SIZE` / `R0_OFFSET` / `R1_OFFSET` / `R2_OFFSET`
/// / `LR_OFFSET` layout, so `cortex_m_switch`'s full-register push/pop can
/// double as both "resume a suspended thread" and "bootstrap a brand new
/// one" with the same code path, the same trick the original's `_swtch`
/// relies on.
///
/// Grounded on `src/task/context.rs`/`src/task/scheduler.rs` (the teacher's
/// own synthetic-interrupt-frame bootstrap and raw `global_asm!` stub) for
/// the pattern, adapted from x86_64's `iretq` frame to the Cortex-M AAPCS
/// register set the original actually targets.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;

/// A thread's entry point: `int func(void *, size_t)` in the original.
pub type EntryFn = extern "C" fn(*mut u8, usize) -> i32;

/// An exclusively-owned stack buffer. `None` for the bootstrap thread, which
/// runs on the caller's own stack (§3).
pub struct Stack {
    buf: Box<[u8]>,
}

impl Stack {
    pub fn new(bytes: usize) -> Self {
        Self {
            buf: vec![0u8; bytes].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    fn top_mut(&mut self) -> *mut u32 {
        let end = unsafe { self.buf.as_mut_ptr().add(self.buf.len()) };
        (end as usize & !0x7) as *mut u32 // 8-byte align per AAPCS
    }
}

#[cfg(all(target_arch = "arm", not(any(test, feature = "std-shim"))))]
mod backend {
    use super::{EntryFn, Stack};

    const FRAME_WORDS: usize = 14;
    const R0: usize = 0;
    const R1: usize = 1;
    const R2: usize = 2;
    const LR: usize = 13;

    /// Opaque saved-context handle: the suspended thread's top-of-stack
    /// pointer. Read and written only by [`switch`].
    pub struct Context {
        sp: *mut u32,
    }

    // A raw stack pointer has no thread affinity of its own; it is only
    // ever touched with the monitor region held.
    unsafe impl Send for Context {}

    core::arch::global_asm!(
        ".global cortex_m_switch",
        ".thumb_func",
        "cortex_m_switch:",
        // Save the caller's full register file (matches the 14-word frame
        // a freshly spawned thread is bootstrapped with below).
        "push {{r0-r12, lr}}",
        "str sp, [r0]",
        "ldr r2, [r1]",
        "mov sp, r2",
        "pop {{r0-r12, lr}}",
        "bx lr",
    );

    extern "C" {
        fn cortex_m_switch(out_sp: *mut *mut u32, in_sp: *const *mut u32);
    }

    extern "C" fn trampoline(args: *mut u8, nbytes: usize, entry_bits: usize) -> ! {
        let entry: EntryFn = unsafe { core::mem::transmute(entry_bits) };
        let rc = entry(args, nbytes);
        crate::thread::exit_from_trampoline(rc)
    }

    /// Construct the context representing the caller of `init()` — the
    /// bootstrap thread. Its `sp` is never read until the first time it is
    /// switched away from, at which point [`switch`] fills it in.
    pub unsafe fn bootstrap() -> Context {
        Context { sp: core::ptr::null_mut() }
    }

    /// Bootstrap a freshly allocated stack so that switching into it for
    /// the first time lands in [`trampoline`] with `args`/`nbytes`/`entry`
    /// already in `r0`/`r1`/`r2`.
    pub unsafe fn spawn(stack: &mut Stack, entry: EntryFn, args: *mut u8, nbytes: usize) -> Context {
        let top = stack.top_mut();
        let frame = top.sub(FRAME_WORDS);
        for i in 0..FRAME_WORDS {
            core::ptr::write(frame.add(i), 0);
        }
        core::ptr::write(frame.add(R0), args as u32);
        core::ptr::write(frame.add(R1), nbytes as u32);
        core::ptr::write(frame.add(R2), (entry as usize as u32) | 1);
        core::ptr::write(frame.add(LR), (trampoline as usize as u32) | 1);
        Context { sp: frame }
    }

    /// Save `from`'s live register state, resume `to`. Never returns to the
    /// caller until some later `switch` targets `from` again.
    pub unsafe fn switch(from: &mut Context, to: &Context) {
        cortex_m_switch(&mut from.sp, &to.sp);
    }
}

#[cfg(any(test, feature = "std-shim"))]
mod backend {
    //! Host simulation backend used by `cargo test` and by the `std-shim`
    //! feature. Grounded on the `std-shim` pattern documented in the
    //! sibling bare-metal preemptive-threads crate in the example pack:
    //! instead of switching raw stack pointers, each slot is a parked/
    //! unparked `std::thread`,
    //! strictly handed off one at a time so execution stays logically
    //! single-threaded — the scheduler's table-manipulation logic is
    //! exercised exactly as it would be on real hardware, just without a
    //! real stack switch underneath it.
    extern crate std;

    use super::{EntryFn, Stack};
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    pub struct Context {
        handle: thread::Thread,
        ready: Arc<AtomicBool>,
    }

    pub unsafe fn bootstrap() -> Context {
        Context {
            handle: thread::current(),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub unsafe fn spawn(_stack: &mut Stack, entry: EntryFn, args: *mut u8, nbytes: usize) -> Context {
        let ready = Arc::new(AtomicBool::new(false));
        let ready_thread = ready.clone();
        let args_addr = args as usize;
        let builder = thread::Builder::new().name("cortex_threads-sim".into());
        let join = builder
            .spawn(move || {
                while !ready_thread.load(Ordering::Acquire) {
                    thread::park();
                }
                let rc = entry(args_addr as *mut u8, nbytes);
                crate::thread::exit_from_trampoline(rc);
            })
            .expect("failed to spawn simulated thread");
        let handle = join.thread().clone();
        // The join handle itself is intentionally leaked: the simulated
        // thread parks forever once its slot goes INVALID, exactly like
        // real hardware leaves a dead thread's stack inert until reuse.
        core::mem::forget(join);
        Context { handle, ready }
    }

    pub unsafe fn switch(from: &mut Context, to: &Context) {
        to.ready.store(true, Ordering::Release);
        to.handle.unpark();
        from.ready.store(false, Ordering::Release);
        while !from.ready.load(Ordering::Acquire) {
            thread::park();
        }
    }
}

#[cfg(not(any(all(target_arch = "arm", not(any(test, feature = "std-shim"))), test, feature = "std-shim")))]
compile_error!("cortex_threads targets Cortex-M (target_arch = \"arm\"); host builds need the `std-shim` feature (enabled automatically under `cargo test`), which uses the simulation backend");

pub use backend::{bootstrap, spawn, switch, Context};
