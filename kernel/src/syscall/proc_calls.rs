//! exit/getpid/sleep/spawn/waitpid/kill syscalls.

use crate::error::KernelResult;
use crate::process;
use crate::process::table::PROCESS_TABLE;

pub fn sys_exit(status: i32) -> KernelResult<i32> {
    let pid = process::current_pid();
    process::proc_kill_with_status(pid, status);
    loop {
        process::scheduler::yield_now();
    }
}

pub fn sys_getpid() -> KernelResult<i32> {
    Ok(process::current_pid() as i32)
}

pub fn sys_sleep(index: usize, ticks: u64) -> KernelResult<i32> {
    crate::timer::sleep_ticks(index, ticks);
    Ok(0)
}

pub fn sys_spawn(path_ptr: usize) -> KernelResult<i32> {
    let path = super::read_user_cstr(path_ptr)?;
    let cwd = {
        let index = super::current_index();
        PROCESS_TABLE.lock().slots[index].cwd_inode
    };
    let inode = crate::vfs::resolve(&path, cwd)?;
    let size = crate::vfs::size(inode)?;
    let mut data = alloc::vec![0u8; size];
    crate::vfs::read(inode, 0, &mut data)?;
    let parent = process::current_pid();
    let pid = crate::elf::load(crate::elf::Source::Bytes(&data), parent)?;
    Ok(pid as i32)
}

pub fn sys_waitpid(pid: u32) -> KernelResult<i32> {
    let parent = process::current_pid();
    let (child_pid, status) = if pid == 0 {
        process::waitpid(parent)
    } else {
        // Spin until the specific child is reaped; `waitpid` only
        // guarantees "any child", so loop past unrelated wakeups.
        loop {
            let (reaped_pid, status) = process::waitpid(parent);
            if reaped_pid == pid {
                break (reaped_pid, status);
            }
        }
    };
    let _ = child_pid;
    Ok(status)
}

pub fn sys_kill(pid: u32, sig: u32) -> KernelResult<i32> {
    process::signal::proc_signal(pid, sig);
    Ok(0)
}
