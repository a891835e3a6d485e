//! 100 Hz tick counter and `sleep(ticks)` wheel.
//!
//! The PIT (an external collaborator; only its ~100 Hz tick contract
//! matters here) drives IRQ0, which the interrupt dispatcher funnels into
//! [`crate::process::scheduler::tick`] after this module's [`tick`] runs.
//! `tick` owns exactly two duties: bump the monotonic tick counter, and
//! decrement every sleeping process's remaining-ticks counter, promoting
//! any that reach zero back to READY.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::config::SLEEP_WHEEL_SLOTS;
use crate::process::pcb::ProcessState;
use crate::process::table::PROCESS_TABLE;

static TICK_COUNT: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy)]
struct Sleeper {
    process_index: usize,
    remaining_ticks: u64,
}

struct SleepWheel {
    slots: [Option<Sleeper>; SLEEP_WHEEL_SLOTS],
}

impl SleepWheel {
    const fn new() -> Self {
        Self { slots: [None; SLEEP_WHEEL_SLOTS] }
    }
}

static SLEEPERS: Mutex<SleepWheel> = Mutex::new(SleepWheel::new());

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_INPUT_HZ: u32 = 1_193_182;

/// Program the PIT's channel 0 for square-wave mode at
/// [`crate::config::TICK_HZ`] and reset the tick counter. IRQ0 itself is
/// wired to [`tick`] by `arch::x86::interrupts::trap_dispatch`.
pub fn init() {
    TICK_COUNT.store(0, Ordering::Relaxed);

    let divisor = (PIT_INPUT_HZ / crate::config::TICK_HZ) as u16;
    crate::arch::outb(PIT_COMMAND, 0x36); // channel 0, lobyte/hibyte, mode 3
    crate::arch::outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
    crate::arch::outb(PIT_CHANNEL0, (divisor >> 8) as u8);
}

/// Current tick count since boot.
pub fn get_tick_count() -> u64 {
    TICK_COUNT.load(Ordering::Relaxed)
}

/// Convert a tick count to milliseconds at the configured `TICK_HZ`.
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / crate::config::TICK_HZ as u64
}

/// Block the calling process for `ticks` timer ticks. Called from the
/// `sleep` syscall. There is no way to be woken early short of
/// termination (SIGKILL-equivalent abort, handled by `proc_kill`).
pub fn sleep_ticks(process_index: usize, ticks: u64) {
    if ticks == 0 {
        return;
    }
    {
        let mut wheel = SLEEPERS.lock();
        let slot = wheel
            .slots
            .iter()
            .position(|s| s.is_none())
            .expect("sleep wheel exhausted: more sleepers than MAX_PROCESSES slots");
        wheel.slots[slot] = Some(Sleeper { process_index, remaining_ticks: ticks });
    }
    PROCESS_TABLE.lock().slots[process_index].state = ProcessState::Blocked;
    crate::process::scheduler::yield_now();
}

/// Called once per timer tick, before the scheduler's round-robin scan.
pub fn tick() {
    TICK_COUNT.fetch_add(1, Ordering::Relaxed);

    let mut wheel = SLEEPERS.lock();
    for slot in wheel.slots.iter_mut() {
        if let Some(sleeper) = slot {
            sleeper.remaining_ticks = sleeper.remaining_ticks.saturating_sub(1);
            if sleeper.remaining_ticks == 0 {
                let index = sleeper.process_index;
                *slot = None;
                let mut table = PROCESS_TABLE.lock();
                if table.slots[index].state == ProcessState::Blocked {
                    table.slots[index].state = ProcessState::Ready;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn ticks_to_ms_matches_tick_hz() {
        assert_eq!(ticks_to_ms(crate::config::TICK_HZ as u64), 1000);
    }
}
