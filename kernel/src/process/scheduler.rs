//! Round-robin preemptive scheduler (C6).
//!
//! Every context switch — whether a timer-driven preemption or a process
//! resuming after `sleep_on` — happens by hijacking the kernel stack
//! pointer from inside the trap-return path: a suspended process's kernel
//! stack always has, at its saved `esp`, the exact layout a real interrupt
//! entry would leave behind (a return address into
//! [`crate::arch::x86::interrupts::trap_return`] followed by the saved
//! [`crate::arch::TrapFrame`]). Resuming a process is therefore nothing
//! more than loading that `esp` and executing `ret`.

use crate::arch::{self, TrapFrame};
use crate::arch::x86::gdt;
use crate::config::MAX_PROCESSES;
use crate::mm::paging;
use crate::process::pcb::ProcessState;
use crate::process::table::{CURRENT, PROCESS_TABLE};

core::arch::global_asm!(
    ".global resume_context",
    "resume_context:",
    "mov esp, [esp + 4]",
    "ret",
);

extern "C" {
    /// Resume execution on a previously suspended (or freshly synthesized)
    /// kernel stack.
    ///
    /// # Safety
    /// `esp_final` must point at a stack location laid out exactly like the
    /// one `trap_common_stub` leaves behind: `[return-into-trap_return][tf
    /// pointer (ignored)][TrapFrame]`. Never returns.
    fn resume_context(esp_final: u32) -> !;
}

/// Current effective CR3: 0 in the process table means "kernel address
/// space", which is physically `paging::kernel_pd_phys()`.
fn effective_cr3(process_cr3: u32) -> u32 {
    if process_cr3 == 0 { paging::kernel_pd_phys() } else { process_cr3 }
}

/// Timer-tick entry point, called from the IRQ0 handler after EOI. Saves
/// the interrupted context's resume point, picks the next READY process
/// round-robin (falling back to PID 0, "idle"), switches CR3/TSS esp0 if
/// needed, and hijacks execution onto the chosen stack. Never returns to
/// its caller — the function that *does* eventually return from this
/// call frame is a different invocation of `tick`, for a different
/// process, at a later time.
pub fn tick(tf: &mut TrapFrame) -> ! {
    // The ESP value at entry to `trap_dispatch` for this trap, i.e. the
    // address of the `call trap_dispatch` return slot this stack will
    // resume at.
    let suspended_esp = (tf as *mut TrapFrame as u32) - 8;

    let mut table = PROCESS_TABLE.lock();
    let current = *CURRENT.lock();
    table.slots[current].saved_esp = suspended_esp;
    if table.slots[current].state == ProcessState::Running {
        table.slots[current].state = ProcessState::Ready;
    }

    let mut next = current;
    let mut chosen = 0usize; // PID-0 idle slot as ultimate fallback
    for offset in 1..=MAX_PROCESSES {
        let idx = (current + offset) % MAX_PROCESSES;
        if table.slots[idx].state == ProcessState::Ready {
            next = idx;
            chosen = idx;
            break;
        }
        if idx == 0 && table.slots[0].state == ProcessState::Ready {
            chosen = 0;
        }
    }
    if table.slots[next].state != ProcessState::Ready {
        next = chosen;
    }

    table.slots[next].state = ProcessState::Running;
    *CURRENT.lock() = next;

    let new_cr3 = effective_cr3(table.slots[next].cr3);
    if new_cr3 != arch::get_cr3() {
        // SAFETY: new_cr3 is either the kernel PD (always valid) or a PD
        // built by `pgdir_create`/`pgdir_map_user_page`, which always
        // carries the kernel's higher-half mappings, so the instruction
        // stream remains mapped across the switch.
        unsafe { arch::set_cr3(new_cr3) };
    }
    if table.slots[next].is_user {
        gdt::set_kernel_stack(table.slots[next].kstack_top as u32);
    }

    let resume_esp = table.slots[next].saved_esp;
    drop(table);

    // SAFETY: resume_esp was either produced by a previous `tick()` call
    // suspending this same process, or synthesized by `proc_create_*` with
    // the identical stack layout.
    unsafe { resume_context(resume_esp) };
}

/// Voluntarily give up the CPU until the current process's state becomes
/// RUNNING again. Used by [`crate::process::wait::WaitQueue::sleep_on`]
/// after marking the process BLOCKED: this process keeps executing this
/// loop (with interrupts enabled) until some future timer tick's
/// round-robin scan finds it READY and switches back in, at which point
/// this call returns normally.
pub fn yield_now() {
    loop {
        let current = *CURRENT.lock();
        if PROCESS_TABLE.lock().slots[current].state == ProcessState::Running {
            return;
        }
        arch::irq_enable();
        arch::halt();
    }
}
