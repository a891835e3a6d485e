//! Process model and preemptive scheduler (C6), wait queues and signals
//! (C7).

pub mod pcb;
pub mod scheduler;
pub mod signal;
pub mod table;
pub mod wait;

use crate::arch::TrapFrame;
use crate::arch::x86::gdt::{KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR, USER_CODE_SELECTOR, USER_DATA_SELECTOR};
use crate::arch::x86::interrupts::trap_return;
use crate::config::KSTACK_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::mm::paging;
use crate::process::pcb::{Pid, ProcessState, FD_EMPTY, IDLE_PID};
use crate::process::table::{kstack_range, PROCESS_TABLE};
use crate::process::wait::WaitQueue;

/// Global queue parents block on inside `waitpid`.
pub static CHILD_WAIT: WaitQueue = WaitQueue::new();

/// Mark the boot thread as PID 0, RUNNING, kernel address space. Must run
/// once, before interrupts are enabled and before any other
/// `proc_create_*` call.
pub fn init() {
    let mut table = PROCESS_TABLE.lock();
    let idle = &mut table.slots[0];
    idle.pid = IDLE_PID;
    idle.state = ProcessState::Running;
    idle.cr3 = 0;
    let (base, top) = kstack_range(0);
    idle.kstack_base = base;
    idle.kstack_top = top;
    idle.fds = [FD_EMPTY; crate::config::MAX_FDS];
}

/// Build a synthetic trap frame and fake return address at the top of
/// `kstack_top`'s stack so the scheduler can resume this process as if it
/// had just taken a trap. Returns the resulting `saved_esp`.
fn synthesize_stack(kstack_top: usize, entry: u32, user: bool, user_esp: u32) -> u32 {
    let tf_base = kstack_top - core::mem::size_of::<TrapFrame>();
    // SAFETY: tf_base lies within the exclusively-owned kernel stack
    // reserved for this process slot, freshly claimed and not yet running.
    let tf = unsafe { &mut *(tf_base as *mut TrapFrame) };
    *tf = TrapFrame::default();
    tf.eip = entry;
    tf.eflags = 0x202; // IF set
    if user {
        tf.cs = USER_CODE_SELECTOR as u32;
        tf.ds = USER_DATA_SELECTOR as u32;
        tf.es = USER_DATA_SELECTOR as u32;
        tf.fs = USER_DATA_SELECTOR as u32;
        tf.gs = USER_DATA_SELECTOR as u32;
        tf.ss = USER_DATA_SELECTOR as u32;
        tf.useresp = user_esp;
    } else {
        tf.cs = KERNEL_CODE_SELECTOR as u32;
        tf.ds = KERNEL_DATA_SELECTOR as u32;
        tf.es = KERNEL_DATA_SELECTOR as u32;
        tf.fs = KERNEL_DATA_SELECTOR as u32;
        tf.gs = KERNEL_DATA_SELECTOR as u32;
    }

    let ret_slot = tf_base - 8;
    // SAFETY: ret_slot/garbage slot sit just below the trap frame, still
    // within the same exclusively-owned kernel stack page.
    unsafe {
        *((tf_base - 4) as *mut u32) = 0; // unused tf-pointer slot, skipped by `add esp, 4`
        *(ret_slot as *mut u32) = trap_return as u32;
    }
    ret_slot as u32
}

/// Claim a process slot, synthesize a ring-0 trap frame, and mark it
/// READY. Used for kernel-internal worker threads, which never receive
/// signals and share the kernel's address space (cr3 = 0).
pub fn proc_create_kernel_thread(entry: fn() -> !) -> KernelResult<Pid> {
    let mut table = PROCESS_TABLE.lock();
    let index = table.claim()?;
    let (base, top) = kstack_range(index);
    table.slots[index].kstack_base = base;
    table.slots[index].kstack_top = top;
    table.slots[index].cr3 = 0;
    table.slots[index].cwd_inode = 0;
    let saved_esp = synthesize_stack(top, entry as u32, false, 0);
    table.slots[index].saved_esp = saved_esp;
    table.slots[index].state = ProcessState::Ready;
    Ok(table.slots[index].pid)
}

/// Claim a process slot, build a fresh address space, synthesize a ring-3
/// trap frame, and mark it READY. stdio fds (0,1,2) are bound to the
/// console.
pub fn proc_create_user_process(pd_phys: u32, entry: u32, user_esp: u32, parent: Pid) -> KernelResult<Pid> {
    let mut table = PROCESS_TABLE.lock();
    let index = table.claim()?;
    let (base, top) = kstack_range(index);
    table.slots[index].kstack_base = base;
    table.slots[index].kstack_top = top;
    table.slots[index].cr3 = pd_phys;
    table.slots[index].is_user = true;
    table.slots[index].parent_pid = parent;
    table.slots[index].cwd_inode = 0;
    table.slots[index].mmap_cursor = crate::config::USER_MMAP_BASE;
    let saved_esp = synthesize_stack(top, entry, true, user_esp);
    table.slots[index].saved_esp = saved_esp;
    table.slots[index].state = ProcessState::Ready;
    let pid = table.slots[index].pid;
    drop(table);
    crate::fd::bind_console_stdio(pid);
    Ok(pid)
}

/// Terminate `pid`: mark ZOMBIE, close FDs, switch off its address space
/// if it has one (self-kill defers actual CR3 switch to whichever process
/// the scheduler resumes next, since the kernel PD is always valid), and
/// wake the parent's wait queue. Safe to call on the currently running
/// process.
pub fn proc_kill_with_status(pid: Pid, exit_status: i32) {
    let index = {
        let table = PROCESS_TABLE.lock();
        match table.find_index(pid) {
            Some(i) => i,
            None => return,
        }
    };

    crate::fd::close_all(index);

    let mut table = PROCESS_TABLE.lock();
    table.slots[index].state = ProcessState::Zombie;
    table.slots[index].exit_status = exit_status;
    let pd = table.slots[index].cr3;
    table.slots[index].cr3 = 0;
    drop(table);

    if pd != 0 {
        paging::pgdir_destroy(pd);
    }

    CHILD_WAIT.wake_up_all();
}

pub fn proc_kill(pid: Pid) {
    proc_kill_with_status(pid, 0);
}

/// Block until any child of `parent` becomes ZOMBIE, then reclaim its
/// slot and return `(child_pid, exit_status)`.
pub fn waitpid(parent: Pid) -> (Pid, i32) {
    loop {
        {
            let mut table = PROCESS_TABLE.lock();
            let found = table
                .slots
                .iter()
                .position(|p| p.parent_pid == parent && p.state == ProcessState::Zombie);
            if let Some(index) = found {
                let pid = table.slots[index].pid;
                let status = table.slots[index].exit_status;
                table.slots[index].state = ProcessState::Free;
                return (pid, status);
            }
        }
        CHILD_WAIT.sleep_on();
    }
}

pub fn current_pid() -> Pid {
    let current = *table::CURRENT.lock();
    PROCESS_TABLE.lock().slots[current].pid
}

const _: () = assert!(KSTACK_SIZE >= core::mem::size_of::<TrapFrame>() + 64);
