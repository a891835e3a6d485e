//! Exercises preemptive round-robin scheduling across kernel threads:
//! a worker runs concurrently with `test_entry` purely because the timer
//! interrupt keeps swapping them in, with no explicit yield on the
//! worker's part beyond its own loop bound.

#![no_std]
#![no_main]

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicU32, Ordering};

use spikeos_kernel::process::pcb::IDLE_PID;
use spikeos_kernel::{kernel_assert, kernel_assert_eq, process};
use spikeos_kernel::{exit_qemu, test_panic_handler, QemuExitCode};

static COUNTER: AtomicU32 = AtomicU32::new(0);
const ITERS: u32 = 1_000_000;

fn worker() -> ! {
    for _ in 0..ITERS {
        COUNTER.fetch_add(1, Ordering::Relaxed);
    }
    process::proc_kill(process::current_pid());
    // `proc_kill` never returns control past the next tick, but the
    // scheduler still expects this function to diverge until it does.
    loop {
        spikeos_kernel::arch::halt();
    }
}

#[no_mangle]
pub extern "Rust" fn test_entry() -> ! {
    let before = COUNTER.load(Ordering::Relaxed);
    kernel_assert_eq!(before, 0);

    let child = process::proc_create_kernel_thread(worker).expect("spawn worker");
    let (reaped, status) = process::waitpid(IDLE_PID);
    kernel_assert_eq!(reaped, child);
    kernel_assert_eq!(status, 0);
    kernel_assert_eq!(COUNTER.load(Ordering::Relaxed), ITERS);

    exit_qemu(QemuExitCode::Success);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
