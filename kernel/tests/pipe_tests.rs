//! Exercises blocking pipe reads/writes across two kernel threads, and
//! the broken-pipe error path when the read end is already gone.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use spikeos_kernel::error::KernelError;
use spikeos_kernel::process::pcb::IDLE_PID;
use spikeos_kernel::{exit_qemu, test_panic_handler, QemuExitCode};
use spikeos_kernel::{kernel_assert, kernel_assert_eq, pipe, process};

static mut READER_PIPE: pipe::PipeId = 0;

fn reader_thread() -> ! {
    // SAFETY: written once by `test_entry` before this thread is spawned,
    // never mutated again.
    let id = unsafe { READER_PIPE };
    let mut buf = [0u8; 32];
    let n = pipe::read(id, &mut buf).expect("blocking read");
    kernel_assert_eq!(&buf[..n], b"hello from writer");
    pipe::close_reader(id);
    process::proc_kill(process::current_pid());
    loop {
        spikeos_kernel::arch::halt();
    }
}

#[no_mangle]
pub extern "Rust" fn test_entry() -> ! {
    let id = pipe::create().expect("create pipe");
    // SAFETY: no other thread touches READER_PIPE until after this store.
    unsafe { READER_PIPE = id };

    let reader = process::proc_create_kernel_thread(reader_thread).expect("spawn reader");
    // The reader blocks on an empty ring immediately; this write only
    // unblocks it once both halves are live.
    let n = pipe::write(id, b"hello from writer").expect("write to blocked reader");
    kernel_assert_eq!(n, b"hello from writer".len());
    pipe::close_writer(id);

    let (reaped, status) = process::waitpid(IDLE_PID);
    kernel_assert_eq!(reaped, reader);
    kernel_assert_eq!(status, 0);

    // Second pipe: close the read end up front, then writing must fail
    // with BrokenPipe instead of blocking forever.
    let id2 = pipe::create().expect("create second pipe");
    pipe::close_reader(id2);
    match pipe::write(id2, b"x") {
        Err(KernelError::BrokenPipe) => {}
        other => panic!("expected BrokenPipe, got {:?}", other),
    }
    pipe::close_writer(id2);

    exit_qemu(QemuExitCode::Success);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
