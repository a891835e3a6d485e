//! Exercises path resolution, directory nesting and unlink against the
//! live VFS the boot sequence already initialized.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use spikeos_kernel::vfs::{self, ROOT_INODE};
use spikeos_kernel::{exit_qemu, test_panic_handler, QemuExitCode};
use spikeos_kernel::{kernel_assert, kernel_assert_eq};

#[no_mangle]
pub extern "Rust" fn test_entry() -> ! {
    vfs::mkdir("/etc", ROOT_INODE).expect("mkdir /etc");
    let etc = vfs::resolve("/etc", ROOT_INODE).expect("resolve /etc");
    kernel_assert!(etc != ROOT_INODE);

    let file = vfs::create_file("/etc/motd", ROOT_INODE).expect("create /etc/motd");
    kernel_assert_eq!(vfs::resolve("/etc/motd", ROOT_INODE).unwrap(), file);

    let msg = b"welcome to spikeos\n";
    let written = vfs::write(file, 0, msg).expect("write motd");
    kernel_assert_eq!(written, msg.len());

    let mut buf = [0u8; 64];
    let read = vfs::read(file, 0, &mut buf).expect("read motd");
    kernel_assert_eq!(&buf[..read], msg);

    // Relative resolution from /etc as cwd.
    kernel_assert_eq!(vfs::resolve("motd", etc).unwrap(), file);

    kernel_assert!(vfs::unlink("/etc/other", ROOT_INODE).is_err());

    vfs::unlink("/etc/motd", ROOT_INODE).expect("unlink motd");
    kernel_assert!(vfs::resolve("/etc/motd", ROOT_INODE).is_err());

    // Non-empty directories refuse removal.
    kernel_assert!(vfs::unlink("/etc", ROOT_INODE).is_ok());
    kernel_assert!(vfs::resolve("/etc", ROOT_INODE).is_err());

    exit_qemu(QemuExitCode::Success);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
