//! Smoke test: the boot sequence up through `process::init`/`drivers::init`
//! leaves the kernel in a state where the idle process (pid 0) exists and
//! the heap allocator works. Linked against `spikeos_kernel`'s own
//! `_start`/`bootstrap::kernel_entry` (see `arch::x86::boot`); this file
//! only supplies the `test_entry` hook `kernel_entry` calls once bring-up
//! finishes.

#![no_std]
#![no_main]

extern crate alloc;

use alloc::vec::Vec;
use core::panic::PanicInfo;

use spikeos_kernel::process::pcb::IDLE_PID;
use spikeos_kernel::{kernel_assert, kernel_assert_eq, process};
use spikeos_kernel::{exit_qemu, test_panic_handler, QemuExitCode};

#[no_mangle]
pub extern "Rust" fn test_entry() -> ! {
    kernel_assert_eq!(process::current_pid(), IDLE_PID);

    // Heap is up by the time `test_entry` runs; a Vec growing past its
    // inline capacity exercises the allocator, not just `Box::new`.
    let mut v = Vec::new();
    for i in 0..64u32 {
        v.push(i);
    }
    kernel_assert_eq!(v.len(), 64);
    kernel_assert_eq!(v.iter().sum::<u32>(), (0..64u32).sum());

    exit_qemu(QemuExitCode::Success);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
