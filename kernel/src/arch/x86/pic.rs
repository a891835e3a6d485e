//! 8259 PIC remap/mask/EOI, wrapping the `pic8259` crate.
//!
//! Out of the core's scope per spec §1 ("PIC remap... GDT/IDT/TSS
//! bootstrap assembly" are collaborators), but the core still needs the
//! three operations the interrupt dispatcher calls directly, so they live
//! here rather than behind a trait object.

use pic8259::ChainedPics;
use spin::Mutex;

use crate::arch::x86::interrupts::IRQ_BASE;

const PIC_1_OFFSET: u8 = IRQ_BASE;
const PIC_2_OFFSET: u8 = IRQ_BASE + 8;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Remap both PICs so IRQs 0..16 land on vectors 32..47, clear of the CPU
/// exception vectors.
pub fn init() {
    // SAFETY: called once at boot before interrupts are enabled.
    unsafe { PICS.lock().initialize() };
}

pub fn eoi(irq: u8) {
    // SAFETY: `irq` is the line whose handler just returned; the dispatcher
    // guarantees this is called exactly once per serviced interrupt.
    unsafe { PICS.lock().notify_end_of_interrupt(PIC_1_OFFSET + irq) };
}

pub fn set_mask(irq: u8) {
    // SAFETY: masks only the addressed line's bit in the PIC's IMR.
    unsafe { PICS.lock().write_masks_one(irq, true) };
}

pub fn clear_mask(irq: u8) {
    // SAFETY: clears only the addressed line's bit in the PIC's IMR.
    unsafe { PICS.lock().write_masks_one(irq, false) };
}

trait WriteMaskOne {
    unsafe fn write_masks_one(&mut self, irq: u8, mask: bool);
}

impl WriteMaskOne for ChainedPics {
    unsafe fn write_masks_one(&mut self, irq: u8, mask: bool) {
        use x86::io::{inb, outb};
        let (port, bit) = if irq < 8 { (0x21, irq) } else { (0xA1, irq - 8) };
        let current = inb(port);
        let updated = if mask { current | (1 << bit) } else { current & !(1 << bit) };
        outb(port, updated);
    }
}
