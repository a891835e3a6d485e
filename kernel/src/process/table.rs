//! Fixed-size global process table.

use spin::Mutex;

use crate::config::{KSTACK_SIZE, MAX_PROCESSES};
use crate::error::KernelError;
use crate::process::pcb::{Pid, Process, ProcessState};

pub struct ProcessTable {
    pub slots: [Process; MAX_PROCESSES],
    next_pid: Pid,
}

impl ProcessTable {
    const fn new() -> Self {
        Self { slots: [const { Process::empty() }; MAX_PROCESSES], next_pid: 1 }
    }

    /// Claim a free slot, assigning it a fresh PID. Returns the slot index.
    pub fn claim(&mut self) -> Result<usize, KernelError> {
        let index = self
            .slots
            .iter()
            .position(|p| p.state == ProcessState::Free)
            .ok_or(KernelError::ProcessTableFull)?;
        let pid = self.next_pid;
        self.next_pid = self.next_pid.wrapping_add(1).max(1);
        self.slots[index] = Process::empty();
        self.slots[index].pid = pid;
        self.slots[index].state = ProcessState::New;
        Ok(index)
    }

    pub fn find_index(&self, pid: Pid) -> Option<usize> {
        self.slots.iter().position(|p| p.pid == pid && p.state != ProcessState::Free)
    }
}

pub static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Index of the process slot currently RUNNING, or `IDLE_PID`'s slot (0)
/// before the first process is created.
pub static CURRENT: Mutex<usize> = Mutex::new(0);

/// Reserve static, page-aligned kernel stacks for every process slot so
/// `proc_create_*` never needs to allocate frames on the create path.
#[repr(align(4096))]
struct StackPool([[u8; KSTACK_SIZE]; MAX_PROCESSES]);
static mut KSTACKS: StackPool = StackPool([[0; KSTACK_SIZE]; MAX_PROCESSES]);

/// Base/top virtual addresses of the kernel stack reserved for slot
/// `index`.
pub fn kstack_range(index: usize) -> (usize, usize) {
    // SAFETY: KSTACKS is a static array; this only computes addresses of
    // the sub-slice owned exclusively by `index`'s process, never aliased
    // because process creation and stack addressing are both serialized
    // through PROCESS_TABLE's lock.
    let base = unsafe { (&raw const KSTACKS.0[index]) as usize };
    (base, base + KSTACK_SIZE)
}
