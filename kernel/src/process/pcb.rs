//! Process control block.

use crate::config::MAX_FDS;

pub type Pid = u32;

/// Dedicated PID for the boot thread. Never reaped, always the scheduler's
/// fallback when no other process is READY.
pub const IDLE_PID: Pid = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot claimed, trap frame not yet synthesized.
    New,
    Ready,
    Running,
    Blocked,
    /// Exited or killed; resources pending reclamation by `waitpid`/`proc_kill`.
    Zombie,
    /// Slot not in use.
    Free,
}

/// A signed small-integer index into the global open-file pool, or -1 for
/// an unused slot. Mirrors the spec's `fds[MAX_FDS]` exactly; kept as
/// `i32` rather than `Option<u32>` so it maps directly onto the syscall
/// ABI's fd representation.
pub type FdSlot = i32;

pub const FD_EMPTY: FdSlot = -1;

pub struct Process {
    pub pid: Pid,
    pub state: ProcessState,
    /// 0 means "kernel address space" (no distinct user page directory).
    pub cr3: u32,
    pub kstack_base: usize,
    pub kstack_top: usize,
    /// Saved kernel stack pointer; valid when the process is not RUNNING.
    pub saved_esp: u32,
    pub parent_pid: Pid,
    pub exit_status: i32,
    pub cwd_inode: u32,
    pub pending_signals: u32,
    pub fds: [FdSlot; MAX_FDS],
    /// True once this process has a distinct user address space (ring 3).
    pub is_user: bool,
    /// Program break, only meaningful for user processes (`brk` syscall).
    pub brk: usize,
    /// Next free address in the `mmap` window, only meaningful for user
    /// processes.
    pub mmap_cursor: usize,
}

impl Process {
    pub const fn empty() -> Self {
        Self {
            pid: 0,
            state: ProcessState::Free,
            cr3: 0,
            kstack_base: 0,
            kstack_top: 0,
            saved_esp: 0,
            parent_pid: 0,
            exit_status: 0,
            cwd_inode: 0,
            pending_signals: 0,
            fds: [FD_EMPTY; MAX_FDS],
            is_user: false,
            brk: 0,
            mmap_cursor: 0,
        }
    }

    pub fn alloc_fd(&self) -> Option<usize> {
        self.fds.iter().position(|&f| f == FD_EMPTY)
    }
}
