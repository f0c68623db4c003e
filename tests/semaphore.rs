//! End-to-end tests for counting semaphores (`Semaphore::init`/`wait`/
//! `signal`), §4.4/§8 of the specification.

use cortex_threads::{exit, init, join, spawn, test_support, JoinTarget, Semaphore};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

fn lock() -> std::sync::MutexGuard<'static, ()> {
    test_support::LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

static BINARY_SEM: Semaphore = Semaphore::new();
static BINARY_BUSY: AtomicBool = AtomicBool::new(false);
static BINARY_LOG: Mutex<Vec<usize>> = Mutex::new(Vec::new());

extern "C" fn binary_critical_section(args: *mut u8, _nbytes: usize) -> i32 {
    let tag = args as usize;
    BINARY_SEM.wait();
    assert!(
        !BINARY_BUSY.swap(true, Ordering::AcqRel),
        "two threads entered the binary semaphore's critical section at once"
    );
    BINARY_LOG.lock().unwrap().push(tag);
    BINARY_BUSY.store(false, Ordering::Release);
    BINARY_SEM.signal();
    0
}

#[test]
fn binary_semaphore_serializes_two_threads() {
    let _guard = lock();
    init();
    BINARY_SEM.init(1);
    BINARY_BUSY.store(false, Ordering::Release);
    BINARY_LOG.lock().unwrap().clear();

    let a = spawn(binary_critical_section, 1usize as *mut u8, 0).unwrap();
    let b = spawn(binary_critical_section, 2usize as *mut u8, 0).unwrap();

    assert_eq!(join(JoinTarget::Peer(a)).unwrap(), 0);
    assert_eq!(join(JoinTarget::Peer(b)).unwrap(), 0);

    let log = BINARY_LOG.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.contains(&1) && log.contains(&2));
    assert_eq!(BINARY_SEM.count(), 1, "every wait was matched by a signal");
}

static COUNTING_SEM: Semaphore = Semaphore::new();
static CONSUMED: AtomicU32 = AtomicU32::new(0);

extern "C" fn produce_three(_args: *mut u8, _nbytes: usize) -> i32 {
    for _ in 0..3 {
        COUNTING_SEM.signal();
    }
    0
}

extern "C" fn consume_one(_args: *mut u8, _nbytes: usize) -> i32 {
    COUNTING_SEM.wait();
    CONSUMED.fetch_add(1, Ordering::AcqRel);
    0
}

#[test]
fn counting_semaphore_delivers_every_signal_to_some_consumer() {
    let _guard = lock();
    init();
    COUNTING_SEM.init(0);
    CONSUMED.store(0, Ordering::Release);

    let producer = spawn(produce_three, core::ptr::null_mut(), 0).unwrap();
    let c1 = spawn(consume_one, core::ptr::null_mut(), 0).unwrap();
    let c2 = spawn(consume_one, core::ptr::null_mut(), 0).unwrap();
    let c3 = spawn(consume_one, core::ptr::null_mut(), 0).unwrap();

    for id in [producer, c1, c2, c3] {
        assert_eq!(join(JoinTarget::Peer(id)).unwrap(), 0);
    }

    assert_eq!(CONSUMED.load(Ordering::Acquire), 3);
    assert_eq!(COUNTING_SEM.count(), 0);
}

static DEADLOCK_SEM: Semaphore = Semaphore::new();

extern "C" fn wait_forever(_args: *mut u8, _nbytes: usize) -> i32 {
    DEADLOCK_SEM.wait();
    0
}

#[test]
#[should_panic(expected = "deadlock")]
fn main_exiting_while_the_only_other_thread_blocks_on_an_unsignaled_semaphore_is_fatal() {
    let _guard = lock();
    init();
    DEADLOCK_SEM.init(0);

    let _blocked = spawn(wait_forever, core::ptr::null_mut(), 0).unwrap();

    // Bootstrap thread exits directly (not via `join`) while the spawned
    // thread is parked in `WaitForSem` with nobody left to signal it:
    // `exit`'s "no runnable successor" branch must refuse to proceed.
    exit(0);
}
