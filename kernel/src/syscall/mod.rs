//! Syscall dispatch (C8): `int $0x80` entry point, user-pointer
//! validation, and the stable syscall number table.

pub mod fs_calls;
pub mod ipc_calls;
pub mod mem_calls;
pub mod proc_calls;

use alloc::string::String;

use crate::arch::TrapFrame;
use crate::config::KERNEL_VMA_BASE;
use crate::error::{KernelResult, SyscallError};
use crate::process::table::{CURRENT, PROCESS_TABLE};

pub const SYS_EXIT: u32 = 1;
pub const SYS_WRITE: u32 = 2;
pub const SYS_READ: u32 = 3;
pub const SYS_OPEN: u32 = 4;
pub const SYS_CLOSE: u32 = 5;
pub const SYS_SEEK: u32 = 6;
pub const SYS_GETPID: u32 = 7;
pub const SYS_GETCWD: u32 = 8;
pub const SYS_CHDIR: u32 = 9;
pub const SYS_MKDIR: u32 = 10;
pub const SYS_UNLINK: u32 = 11;
pub const SYS_SLEEP: u32 = 12;
pub const SYS_BRK: u32 = 13;
pub const SYS_SPAWN: u32 = 14;
pub const SYS_WAITPID: u32 = 15;
pub const SYS_PIPE: u32 = 16;
pub const SYS_DUP: u32 = 17;
pub const SYS_KILL: u32 = 18;
pub const SYS_SOCKET: u32 = 19;
pub const SYS_BIND: u32 = 20;
pub const SYS_SENDTO: u32 = 21;
pub const SYS_RECVFROM: u32 = 22;
pub const SYS_CLOSESOCK: u32 = 23;
pub const SYS_MMAP: u32 = 24;
pub const SYS_MUNMAP: u32 = 25;
pub const SYS_GPU: u32 = 26;

/// Index of the currently running process's table slot. Syscall handlers
/// operate on this slot; the scheduler only changes `CURRENT` at a tick.
pub fn current_index() -> usize {
    *CURRENT.lock()
}

/// A user pointer range must lie entirely below the kernel's higher half.
/// Whether it is actually mapped is not checked here — an unmapped access
/// is "permitted to fault", which the page-fault handler turns into
/// SIGSEGV on the faulting process (see `mm::paging::page_fault_handler`).
pub fn validate_range(addr: usize, len: usize) -> KernelResult<()> {
    let end = addr.checked_add(len).ok_or(SyscallError::InvalidPointer { addr })?;
    if end > KERNEL_VMA_BASE {
        return Err(SyscallError::InvalidPointer { addr }.into());
    }
    Ok(())
}

/// Copy `len` bytes from a validated user address into a kernel buffer.
///
/// # Safety contract
/// Only valid while the calling process's address space (CR3) is the one
/// currently loaded — true for the whole duration of syscall dispatch,
/// since the scheduler only swaps CR3 at a timer tick.
pub fn copy_from_user(addr: usize, buf: &mut [u8]) -> KernelResult<()> {
    validate_range(addr, buf.len())?;
    // SAFETY: `addr` was just checked to lie below the kernel's higher
    // half, and the current process's page directory is loaded into CR3
    // for the full duration of this syscall, so `addr` names that
    // process's own memory (or faults, which raises SIGSEGV on it).
    unsafe { core::ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), buf.len()) };
    Ok(())
}

pub fn copy_to_user(addr: usize, buf: &[u8]) -> KernelResult<()> {
    validate_range(addr, buf.len())?;
    // SAFETY: see `copy_from_user`.
    unsafe { core::ptr::copy_nonoverlapping(buf.as_ptr(), addr as *mut u8, buf.len()) };
    Ok(())
}

const MAX_PATH_LEN: usize = 256;

/// Read a NUL-terminated path string out of user memory.
pub fn read_user_cstr(addr: usize) -> KernelResult<String> {
    validate_range(addr, 1)?;
    let mut bytes = alloc::vec::Vec::with_capacity(32);
    for i in 0..MAX_PATH_LEN {
        validate_range(addr + i, 1)?;
        // SAFETY: see `copy_from_user`; reads one byte at a time so a
        // string ending exactly at the kernel boundary is still safe to
        // probe.
        let byte = unsafe { *((addr + i) as *const u8) };
        if byte == 0 {
            return String::from_utf8(bytes).map_err(|_| SyscallError::InvalidPointer { addr }.into());
        }
        bytes.push(byte);
    }
    Err(SyscallError::InvalidArgument { arg: addr }.into())
}

/// Dispatched from [`crate::arch::x86::interrupts::trap_dispatch`] for
/// vector 0x80. Reads the syscall number from `eax`, up to three
/// arguments from `ebx,ecx,edx`, and returns the value written back into
/// `tf.eax` (negative on error, via [`KernelError::to_errno`]).
pub fn dispatch(tf: &mut TrapFrame) -> i32 {
    let result = dispatch_inner(tf);
    let ret = match result {
        Ok(v) => v,
        Err(e) => e.to_errno(),
    };
    crate::process::signal::signal_check_pending();
    ret
}

fn dispatch_inner(tf: &mut TrapFrame) -> KernelResult<i32> {
    let nr = tf.eax;
    let a0 = tf.ebx as usize;
    let a1 = tf.ecx as usize;
    let a2 = tf.edx as usize;
    let index = current_index();

    match nr {
        SYS_EXIT => proc_calls::sys_exit(a0 as i32),
        SYS_WRITE => fs_calls::sys_write(index, a0 as i32, a1, a2),
        SYS_READ => fs_calls::sys_read(index, a0 as i32, a1, a2),
        SYS_OPEN => fs_calls::sys_open(index, a0, a1 as u32),
        SYS_CLOSE => fs_calls::sys_close(index, a0 as i32),
        SYS_SEEK => fs_calls::sys_seek(index, a0 as i32, a1),
        SYS_GETPID => proc_calls::sys_getpid(),
        SYS_GETCWD => fs_calls::sys_getcwd(index, a0, a1),
        SYS_CHDIR => fs_calls::sys_chdir(index, a0),
        SYS_MKDIR => fs_calls::sys_mkdir(index, a0),
        SYS_UNLINK => fs_calls::sys_unlink(index, a0),
        SYS_SLEEP => proc_calls::sys_sleep(index, a0 as u64),
        SYS_BRK => mem_calls::sys_brk(index, a0 as u32),
        SYS_SPAWN => proc_calls::sys_spawn(a0),
        SYS_WAITPID => proc_calls::sys_waitpid(a0 as u32),
        SYS_PIPE => fs_calls::sys_pipe(index, a0),
        SYS_DUP => fs_calls::sys_dup(index, a0 as i32),
        SYS_KILL => proc_calls::sys_kill(a0 as u32, a1 as u32),
        SYS_MMAP => mem_calls::sys_mmap(index, a0, a1 as u32),
        SYS_MUNMAP => mem_calls::sys_munmap(index, a0, a1),
        SYS_SOCKET | SYS_BIND | SYS_SENDTO | SYS_RECVFROM | SYS_CLOSESOCK => {
            ipc_calls::sys_socket_family(nr)
        }
        SYS_GPU => ipc_calls::sys_gpu(),
        _ => Err(SyscallError::InvalidSyscall { nr }.into()),
    }
}
