//! PS/2 keyboard driver (IRQ1): scancode decode via `pc_keyboard`, fed into
//! a ring buffer the console read-path blocks on.

use core::sync::atomic::{AtomicUsize, Ordering};

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::process::wait::WaitQueue;

const KEY_BUFFER_SIZE: usize = 256;

struct KeyBuffer {
    buf: [u8; KEY_BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl KeyBuffer {
    const fn new() -> Self {
        Self { buf: [0; KEY_BUFFER_SIZE], head: AtomicUsize::new(0), tail: AtomicUsize::new(0) }
    }

    /// Single producer: called from IRQ1 with interrupts already masked.
    fn push(&mut self, byte: u8) {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & (KEY_BUFFER_SIZE - 1);
        if next == self.tail.load(Ordering::Acquire) {
            return; // full, drop
        }
        self.buf[head] = byte;
        self.head.store(next, Ordering::Release);
    }

    /// Single consumer: called from the console read path.
    fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.buf[tail];
        self.tail.store((tail + 1) & (KEY_BUFFER_SIZE - 1), Ordering::Release);
        Some(byte)
    }
}

// SAFETY: push is IRQ1's sole producer, pop is the sole consumer; the two
// sides only touch disjoint ends of the ring via the atomic head/tail.
unsafe impl Send for KeyBuffer {}
unsafe impl Sync for KeyBuffer {}

static mut KEY_BUFFER: KeyBuffer = KeyBuffer::new();
static KEYBOARD: Mutex<Option<Keyboard<layouts::Us104Key, ScancodeSet1>>> = Mutex::new(None);

/// Processes blocked reading stdin with nothing yet queued.
pub static READ_WAIT: WaitQueue = WaitQueue::new();

const DATA_PORT: u16 = 0x60;

pub fn init() {
    *KEYBOARD.lock() =
        Some(Keyboard::new(ScancodeSet1::new(), layouts::Us104Key, HandleControl::MapLettersToUnicode));
    crate::arch::x86::interrupts::register_irq_handler(1, irq_handler);
}

/// IRQ1 entry point: read the pending scancode off the controller and
/// decode it. Registered with the IDT by `init`.
fn irq_handler(_tf: &mut crate::arch::TrapFrame) {
    let scancode = crate::arch::inb(DATA_PORT);
    handle_scancode(scancode);
}

/// Decode one scancode read from port 0x60. Must not block or take any
/// lock the console write path also takes.
pub fn handle_scancode(scancode: u8) {
    let mut guard = KEYBOARD.lock();
    let Some(kb) = guard.as_mut() else { return };
    let Ok(Some(event)) = kb.add_byte(scancode) else { return };
    let Some(key) = kb.process_keyevent(event) else { return };
    if let DecodedKey::Unicode(ch) = key {
        if ch.is_ascii() {
            // SAFETY: sole producer, see KeyBuffer::push.
            #[allow(static_mut_refs)]
            unsafe {
                KEY_BUFFER.push(ch as u8)
            };
            READ_WAIT.wake_up_one();
        }
    }
}

/// Pop one decoded byte, non-blocking.
pub fn read_key() -> Option<u8> {
    // SAFETY: sole consumer, see KeyBuffer::pop.
    #[allow(static_mut_refs)]
    unsafe {
        KEY_BUFFER.pop()
    }
}
