//! Wait queues (C7): cooperative blocking with FIFO wake order.
//!
//! A `WaitQueue` stores process-table slot indices, not owning pointers —
//! processes live in the fixed-size table and are addressed everywhere by
//! stable index, so no queue can outlive or dangle past its target.

use alloc::collections::VecDeque;

use spin::Mutex;

use crate::process::pcb::ProcessState;
use crate::process::table::{CURRENT, PROCESS_TABLE};

pub struct WaitQueue {
    sleepers: Mutex<VecDeque<usize>>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { sleepers: Mutex::new(VecDeque::new()) }
    }

    /// Block the current process on this queue and yield to the
    /// scheduler. Returns once some other context has called
    /// `wake_up_one`/`wake_up_all` and the scheduler has resumed this
    /// process (state is RUNNING again on return).
    pub fn sleep_on(&self) {
        let was_enabled = crate::arch::irq_save();
        let current = *CURRENT.lock();
        self.sleepers.lock().push_back(current);
        PROCESS_TABLE.lock().slots[current].state = ProcessState::Blocked;
        crate::arch::irq_restore(was_enabled);

        crate::process::scheduler::yield_now();
    }

    /// Wake the head of the queue, if any. Idempotent on an empty queue.
    pub fn wake_up_one(&self) {
        let was_enabled = crate::arch::irq_save();
        if let Some(index) = self.sleepers.lock().pop_front() {
            let mut table = PROCESS_TABLE.lock();
            if table.slots[index].state == ProcessState::Blocked {
                table.slots[index].state = ProcessState::Ready;
            }
        }
        crate::arch::irq_restore(was_enabled);
    }

    /// Wake every sleeper. Idempotent on an empty queue.
    pub fn wake_up_all(&self) {
        let was_enabled = crate::arch::irq_save();
        let mut sleepers = self.sleepers.lock();
        let mut table = PROCESS_TABLE.lock();
        while let Some(index) = sleepers.pop_front() {
            if table.slots[index].state == ProcessState::Blocked {
                table.slots[index].state = ProcessState::Ready;
            }
        }
        crate::arch::irq_restore(was_enabled);
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
