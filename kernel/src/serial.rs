//! COM1 serial port used for early boot diagnostics and the `log` backend.
//!
//! The framebuffer/VGA console is a collaborator outside this core's scope
//! (see spec §6); the serial port is the one console surface the kernel
//! itself owns, because it is needed before paging and the console driver
//! are up.

use core::fmt;

use spin::Mutex;
use uart_16550::SerialPort;

static SERIAL1: Mutex<Option<SerialPort>> = Mutex::new(None);

/// Initialize COM1. Must run before any `serial_print!` call.
pub fn init() {
    // SAFETY: 0x3F8 is the standard COM1 I/O base; this runs once at boot
    // before any other code touches the port.
    let mut port = unsafe { SerialPort::new(0x3F8) };
    port.init();
    *SERIAL1.lock() = Some(port);
}

#[doc(hidden)]
pub fn _serial_print(args: fmt::Arguments) {
    use fmt::Write;

    let was_enabled = crate::arch::irq_save();
    if let Some(port) = SERIAL1.lock().as_mut() {
        let _ = port.write_fmt(args);
    }
    crate::arch::irq_restore(was_enabled);
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_serial_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*))
    };
}
