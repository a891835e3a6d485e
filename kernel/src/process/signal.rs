//! Pending-signal bitset and delivery (C7).
//!
//! Signals are not masked, not queued, and not handler-dispatched: a
//! pending bit per signal number, checked only at well-known safe points
//! (syscall return, fault return, scheduler resume), with a single default
//! action — terminate with `exit_status = 128 + signum`.

use crate::process::pcb::ProcessState;
use crate::process::table::{CURRENT, PROCESS_TABLE};

pub const SIGSEGV: u32 = 11;
pub const SIGPIPE: u32 = 13;
pub const SIGKILL: u32 = 9;

/// Set `sig`'s bit on `pid`. If the target is BLOCKED, promote it to READY
/// so it observes delivery at its next safe point. No-op on an unknown pid
/// (kernel threads never receive signals; callers should not target one).
pub fn proc_signal(pid: u32, sig: u32) {
    let mut table = PROCESS_TABLE.lock();
    if let Some(index) = table.find_index(pid) {
        table.slots[index].pending_signals |= 1 << sig;
        if table.slots[index].state == ProcessState::Blocked {
            table.slots[index].state = ProcessState::Ready;
        }
    }
}

/// Raise `sig` on the currently running process (used by fault handlers
/// that don't have a pid handy).
pub fn raise_on_current(sig: u32) {
    let current = *CURRENT.lock();
    let mut table = PROCESS_TABLE.lock();
    table.slots[current].pending_signals |= 1 << sig;
}

/// Inspect and clear the lowest-numbered pending signal on the current
/// process, applying the default action (terminate). Called from the
/// syscall return path, the fault return path, and after a context switch
/// resumes a process.
pub fn signal_check_pending() {
    let current = *CURRENT.lock();
    let (pid, sig) = {
        let table = PROCESS_TABLE.lock();
        let mask = table.slots[current].pending_signals;
        if mask == 0 {
            return;
        }
        (table.slots[current].pid, mask.trailing_zeros())
    };
    {
        let mut table = PROCESS_TABLE.lock();
        table.slots[current].pending_signals &= !(1 << sig);
    }
    crate::process::proc_kill_with_status(pid, 128 + sig as i32);
}
