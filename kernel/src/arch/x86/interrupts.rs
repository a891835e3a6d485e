//! Interrupt Descriptor Table, trap frame, and the shared trap entry path.
//!
//! Every vector funnels through one of two hand-written assembly stubs
//! (`isr_common_stub` / `irq_common_stub`) that push the fixed-layout
//! [`TrapFrame`] and call [`trap_dispatch`]. This is the syscall gate
//! (vector 0x80), the 32 CPU exception vectors, and the 16 remapped PIC
//! IRQ vectors (32..47).

use core::arch::{asm, global_asm};
use core::mem::size_of;

use spin::Mutex;

use crate::arch::x86::gdt::KERNEL_CODE_SELECTOR;
use crate::arch::x86::pic;

pub const IRQ_BASE: u8 = 32;
pub const SYSCALL_VECTOR: u8 = 0x80;

/// The trap frame pushed onto the ring-0 stack by the common stub, in the
/// exact field order assembly pushes them. `useresp`/`ss` are only valid
/// when the interrupted context was ring 3 (see [`TrapFrame::from_user`]).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

impl TrapFrame {
    pub fn from_user(&self) -> bool {
        (self.cs & 0x3) == 3
    }
}

const _: () = assert!(size_of::<TrapFrame>() == 19 * 4);

#[repr(C, packed)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self { offset_low: 0, selector: 0, zero: 0, type_attr: 0, offset_high: 0 }
    }

    fn new(handler: u32, selector: u16, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

const IDT_ENTRIES: usize = 256;
static IDT: Mutex<[IdtEntry; IDT_ENTRIES]> =
    Mutex::new([const { IdtEntry::missing() }; IDT_ENTRIES]);

/// Registered IRQ handlers, indexed by IRQ line (0..16). `None` means
/// "acknowledge and ignore", matching the spec's IRQ-dispatch contract.
type IrqHandler = fn(&mut TrapFrame);
static IRQ_HANDLERS: Mutex<[Option<IrqHandler>; 16]> = Mutex::new([None; 16]);

/// Registered CPU exception handlers, indexed by vector (0..32). `None`
/// falls back to a register-dump panic.
type ExceptionHandler = fn(&mut TrapFrame);
static EXCEPTION_HANDLERS: Mutex<[Option<ExceptionHandler>; 32]> = Mutex::new([None; 32]);

pub fn register_irq_handler(irq: u8, handler: IrqHandler) {
    IRQ_HANDLERS.lock()[irq as usize] = Some(handler);
}

pub fn register_exception_handler(vector: u8, handler: ExceptionHandler) {
    EXCEPTION_HANDLERS.lock()[vector as usize] = Some(handler);
}

extern "C" {
    fn isr0();
    fn isr1();
    fn isr2();
    fn isr3();
    fn isr4();
    fn isr5();
    fn isr6();
    fn isr7();
    fn isr8();
    fn isr9();
    fn isr10();
    fn isr11();
    fn isr12();
    fn isr13();
    fn isr14();
    fn isr15();
    fn isr16();
    fn isr17();
    fn isr18();
    fn isr19();
    fn isr20();
    fn isr21();
    fn isr22();
    fn isr23();
    fn isr24();
    fn isr25();
    fn isr26();
    fn isr27();
    fn isr28();
    fn isr29();
    fn isr30();
    fn isr31();
    fn irq0();
    fn irq1();
    fn irq2();
    fn irq3();
    fn irq4();
    fn irq5();
    fn irq6();
    fn irq7();
    fn irq8();
    fn irq9();
    fn irq10();
    fn irq11();
    fn irq12();
    fn irq13();
    fn irq14();
    fn irq15();
    fn isr128();
}

/// Initialize the IDT: wire all 32 exception vectors, the 16 IRQ vectors
/// (rebased to 32..47 by the PIC remap), and the `int 0x80` syscall gate.
pub fn init() {
    let isrs: [unsafe extern "C" fn(); 32] = [
        isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13,
        isr14, isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26,
        isr27, isr28, isr29, isr30, isr31,
    ];
    let irqs: [unsafe extern "C" fn(); 16] = [
        irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13,
        irq14, irq15,
    ];

    let mut idt = IDT.lock();
    for (i, f) in isrs.iter().enumerate() {
        idt[i] = IdtEntry::new(*f as u32, KERNEL_CODE_SELECTOR, 0x8E);
    }
    for (i, f) in irqs.iter().enumerate() {
        idt[IRQ_BASE as usize + i] = IdtEntry::new(*f as u32, KERNEL_CODE_SELECTOR, 0x8E);
    }
    // DPL=3 so user-mode `int 0x80` is permitted.
    idt[SYSCALL_VECTOR as usize] = IdtEntry::new(isr128 as u32, KERNEL_CODE_SELECTOR, 0xEE);

    let ptr = IdtPointer {
        limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
        base: idt.as_ptr() as u32,
    };
    // SAFETY: `ptr` describes the IDT `static` built above, which outlives
    // this function. LIDT is the architectural way to install it.
    unsafe {
        asm!("lidt [{0}]", in(reg) &ptr);
    }
}

/// C-level dispatcher reached from every assembly stub with a pointer to
/// the trap frame just pushed.
#[no_mangle]
extern "C" fn trap_dispatch(tf: &mut TrapFrame) {
    match tf.int_no {
        0..=31 => {
            let handler = EXCEPTION_HANDLERS.lock()[tf.int_no as usize];
            match handler {
                Some(h) => h(tf),
                None => panic!("unhandled exception {} at eip=0x{:x}\n{:#x?}", tf.int_no, tf.eip, tf),
            }
        }
        n if n == SYSCALL_VECTOR as u32 => {
            let ret = crate::syscall::dispatch(tf);
            tf.eax = ret as u32;
        }
        n if (IRQ_BASE as u32..IRQ_BASE as u32 + 16).contains(&n) => {
            let irq = (n - IRQ_BASE as u32) as u8;
            if let Some(handler) = IRQ_HANDLERS.lock()[irq as usize] {
                handler(tf);
            }
            pic::eoi(irq);
            if irq == 0 {
                crate::timer::tick();
                crate::process::scheduler::tick(tf);
            }
        }
        n => panic!("unexpected trap vector {}", n),
    }
}

macro_rules! isr_no_err {
    ($name:ident, $num:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            "push dword 0\n",       // dummy error code
            "push dword ", stringify!($num), "\n",
            "jmp trap_common_stub\n",
        ));
    };
}

macro_rules! isr_err {
    ($name:ident, $num:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            // CPU already pushed the error code.
            "push dword ", stringify!($num), "\n",
            "jmp trap_common_stub\n",
        ));
    };
}

macro_rules! irq_stub {
    ($name:ident, $irq:expr, $vector:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            "push dword 0\n",
            "push dword ", stringify!($vector), "\n",
            "jmp trap_common_stub\n",
        ));
    };
}

isr_no_err!(isr0, 0);
isr_no_err!(isr1, 1);
isr_no_err!(isr2, 2);
isr_no_err!(isr3, 3);
isr_no_err!(isr4, 4);
isr_no_err!(isr5, 5);
isr_no_err!(isr6, 6);
isr_no_err!(isr7, 7);
isr_err!(isr8, 8);
isr_no_err!(isr9, 9);
isr_err!(isr10, 10);
isr_err!(isr11, 11);
isr_err!(isr12, 12);
isr_err!(isr13, 13);
isr_err!(isr14, 14); // page fault
isr_no_err!(isr15, 15);
isr_no_err!(isr16, 16);
isr_err!(isr17, 17);
isr_no_err!(isr18, 18);
isr_no_err!(isr19, 19);
isr_no_err!(isr20, 20);
isr_no_err!(isr21, 21);
isr_no_err!(isr22, 22);
isr_no_err!(isr23, 23);
isr_no_err!(isr24, 24);
isr_no_err!(isr25, 25);
isr_no_err!(isr26, 26);
isr_no_err!(isr27, 27);
isr_no_err!(isr28, 28);
isr_no_err!(isr29, 29);
isr_err!(isr30, 30);
isr_no_err!(isr31, 31);

irq_stub!(irq0, 0, 32);
irq_stub!(irq1, 1, 33);
irq_stub!(irq2, 2, 34);
irq_stub!(irq3, 3, 35);
irq_stub!(irq4, 4, 36);
irq_stub!(irq5, 5, 37);
irq_stub!(irq6, 6, 38);
irq_stub!(irq7, 7, 39);
irq_stub!(irq8, 8, 40);
irq_stub!(irq9, 9, 41);
irq_stub!(irq10, 10, 42);
irq_stub!(irq11, 11, 43);
irq_stub!(irq12, 12, 44);
irq_stub!(irq13, 13, 45);
irq_stub!(irq14, 14, 46);
irq_stub!(irq15, 15, 47);

global_asm!(
    ".global isr128",
    "isr128:",
    "push dword 0",
    "push dword 0x80",
    "jmp trap_common_stub",
);

// Shared second half: push segment/GP registers to complete the TrapFrame
// layout, call into Rust with ESP (now pointing at the frame) as the sole
// argument, then reverse everything and `iretd`. `useresp`/`ss` are only
// present on the stack when the interrupted ring was 3; this path treats
// the stack purely positionally and never reads past what the CPU pushed.
global_asm!(
    "trap_common_stub:",
    "pusha",
    "push ds",
    "push es",
    "push fs",
    "push gs",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov fs, ax",
    "mov gs, ax",
    "push esp",
    "call trap_dispatch",
    "jmp trap_return",
);

// Named separately (rather than falling straight through) so the process
// scheduler can take its address: a process resumed by hijacking ESP into
// a suspended kernel stack lands here exactly as if `trap_dispatch` had
// just returned normally on that stack.
global_asm!(
    ".global trap_return",
    "trap_return:",
    "add esp, 4", // discard the tf pointer arg
    "pop gs",
    "pop fs",
    "pop es",
    "pop ds",
    "popa",
    "add esp, 8", // pop int_no, err_code
    "iretd",
);

extern "C" {
    pub fn trap_return();
}
