//! `spikeos-kernel` binary: a thin shell around the `spikeos_kernel` lib
//! crate, which owns the real entry point (`arch::x86::boot`'s `_start`,
//! reached by the bootloader per `link.ld`'s `ENTRY(_start)`) and the rest
//! of the boot sequence (`bootstrap::kernel_entry`).

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use spikeos_kernel::{arch, serial_println};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("kernel panic: {}", info);
    arch::halt_forever();
}
