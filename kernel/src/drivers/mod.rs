//! Device drivers: console (VGA + serial teletype), PS/2 keyboard, and the
//! ATA PIO block device SpikeFS sits on. The desktop/network/USB/GPU
//! driver stack this kernel's teacher carries is out of this core's
//! scope (see spec Non-goals).

pub mod console;
pub mod keyboard;
pub mod storage;

/// Bring up the console and its keyboard input path. Storage is
/// initialized lazily by the first `spikefs::load`/`dump` call.
pub fn init() {
    console::init();
    keyboard::init();
}
