//! Preemptive, single-core, round-robin user-space threads for Cortex-M.
//!
//! Grounded on a teaching library for the Arduino Due (Cortex-M3):
//! cooperative-and-preemptive threads sharing one address space, joined
//! with return values, coordinated with counting semaphores, all driven by
//! a periodic hardware timer the embedding firmware owns.
//!
//! The public surface mirrors the original C API one-to-one:
//!
//! | original            | here                                     |
//! |----------------------|-------------------------------------------|
//! | `Thread_init`        | [`thread::init`]                          |
//! | `Thread_new`         | [`thread::spawn`]                          |
//! | `Thread_exit`        | [`thread::exit`]                           |
//! | `Thread_self`        | [`thread::current`]                        |
//! | `Thread_pause`       | [`thread::pause`]                          |
//! | `Thread_join`        | [`thread::join`]                           |
//! | `Sem_init/wait/signal`| [`sem::Semaphore`]                         |
//!
//! See `DESIGN.md` for the grounding ledger and `SPEC_FULL.md` for the full
//! requirements this crate implements.
#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std-shim"))]
extern crate std;

pub mod config;
pub mod context;
pub mod error;
pub mod monitor;
pub mod scheduler;
pub mod sem;
pub mod thread;

pub use context::EntryFn;
pub use error::UnknownThread;
pub use scheduler::{on_tick, start_default_preemption, start_preemption, TickContext, TickSource};
pub use sem::Semaphore;
pub use thread::{current, exit, init, join, pause, spawn, spawn_with_stack, JoinTarget, ThreadId};

/// Minimal halt-on-panic handler for a crate linked as a standalone image
/// rather than through an application that already owns one. Off by
/// default (a library must not claim the link's single `#[panic_handler]`
/// slot); enable with the `panic-handler` feature for quick demos.
///
/// Grounded on the panic handler in
/// `examples/other_examples/4010a018_tantaouibahaa-preemptive-threads...`,
/// a sibling bare-metal preemptive-threads crate in the example pack.
#[cfg(all(feature = "panic-handler", not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    #[cfg(target_arch = "arm")]
    cortex_m::interrupt::disable();
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
    }
}

/// Serializes `#[test]` functions within a single test binary against the
/// shared global thread pool. Cargo runs `#[test]` functions in the same
/// binary on concurrent OS threads by default; every test in this crate
/// drives the one global [`thread::THREADS`] table, so tests must not
/// interleave. Different files under `tests/` are already isolated (each
/// compiles to its own process), this lock only matters within one file.
/// Built under the same conditions as the simulation backend (see the
/// `std-shim` feature) since it needs `std::sync::Mutex`.
#[cfg(any(test, feature = "std-shim"))]
pub mod test_support {
    pub static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}
