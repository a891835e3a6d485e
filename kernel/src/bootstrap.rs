//! Linear boot sequence: everything between `boot::_start` enabling paging
//! and the idle loop taking over.
//!
//! Order matters and is not configurable: the heap must exist before any
//! subsystem below it allocates, interrupts must stay masked until the
//! process table and scheduler are ready to receive a timer tick, and the
//! init process can only be loaded once the VFS exists to give it a
//! working directory.

use crate::arch::x86::{boot, multiboot, pic};
#[cfg(not(feature = "test-kernel"))]
use crate::elf::{self, Source};
#[cfg(not(feature = "test-kernel"))]
use crate::error::{KernelError, KernelResult};
use crate::log_service::{self, LogLevel};
#[cfg(not(feature = "test-kernel"))]
use crate::process::pcb::{Pid, IDLE_PID};
use crate::{mm, process, serial, serial_println, spikefs, timer, vfs};

extern "C" {
    /// Physical end of the loaded kernel image, defined by `link.ld`.
    static kernel_end_phys: u8;
}

// Each `tests/*.rs` integration binary supplies this symbol instead of
// linking `spikeos-kernel`'s own `main.rs`; `kernel_entry` hands off to it
// once the same mm/vfs/timer/process bring-up production boot uses has run,
// in place of loading the Multiboot initrd as init.
#[cfg(feature = "test-kernel")]
extern "Rust" {
    fn test_entry() -> !;
}

/// Entry point called (via `call`, not `jmp`, so it never actually
/// returns) from the `.boot`-section assembly in `arch::x86::boot` right
/// after paging is enabled.
#[no_mangle]
pub extern "C" fn kernel_entry(magic: u32, info_phys: u32) -> ! {
    serial::init();
    serial_println!("spikeos: boot magic=0x{:x} info=0x{:x}", magic, info_phys);
    if magic != multiboot::MULTIBOOT_MAGIC {
        panic!("not booted by a multiboot loader (magic=0x{:x})", magic);
    }

    crate::arch::init();

    let (pd_phys, identity_pt, heap_pt, fb_pt) = boot::boot_tables_phys();
    // SAFETY: `kernel_end_phys` is a linker-provided symbol, not a real
    // object; only its address is meaningful.
    let kernel_image_end = unsafe { &kernel_end_phys as *const u8 as u32 };
    mm::init(pd_phys, identity_pt, heap_pt, fb_pt, kernel_image_end);

    vfs::vfs_init();
    timer::init();
    log_service::log_init();
    process::init();
    crate::drivers::init();
    log_service::klog(LogLevel::Info, "boot", "mm, vfs, timer, process, drivers up");

    // Timer and keyboard only; everything else stays masked until a
    // driver for it exists.
    pic::clear_mask(0);
    pic::clear_mask(1);

    match spikefs::load() {
        Ok(()) => log_service::klog(LogLevel::Info, "spikefs", "restored image from disk"),
        Err(e) => {
            serial_println!("spikefs: no image to restore ({}), starting empty", e);
            log_service::klog(LogLevel::Warn, "spikefs", "no image to restore, starting empty");
        }
    }

    crate::arch::irq_enable();

    #[cfg(feature = "test-kernel")]
    // SAFETY: provided by the integration test binary this was linked into.
    unsafe {
        test_entry()
    }

    #[cfg(not(feature = "test-kernel"))]
    {
        let init_pid = match load_init_process(info_phys) {
            Ok(pid) => pid,
            Err(e) => panic!("failed to load init process: {}", e),
        };
        serial_println!("spikeos: init process pid={}", init_pid);
        log_service::klog(LogLevel::Info, "boot", "init process loaded");
        idle_loop();
    }
}

/// Load the Multiboot initrd module as the first (and, for this kernel
/// core, only) user process. Its parent is the idle thread (pid 0).
#[cfg(not(feature = "test-kernel"))]
fn load_init_process(info_phys: u32) -> KernelResult<Pid> {
    let (phys_base, end) = multiboot::initrd_range(info_phys)
        .ok_or(KernelError::NotFound { resource: "multiboot init module", id: 0 })?;
    let len = (end - phys_base) as usize;
    elf::load(Source::Initrd { phys_base, len }, IDLE_PID)
}

/// The boot thread becomes the idle thread: sync the filesystem whenever
/// it is dirty and otherwise just wait for the next interrupt.
fn idle_loop() -> ! {
    loop {
        spikefs::sync_if_dirty();
        crate::arch::halt();
    }
}
