//! Global Descriptor Table and Task State Segment.
//!
//! SpikeOS runs in 32-bit protected mode, so this is a hand-rolled 8-byte
//! descriptor table rather than the 64-bit `x86_64` crate's GDT builder.
//! Layout:
//! - 0x00: null descriptor
//! - 0x08: kernel code (ring 0)
//! - 0x10: kernel data (ring 0)
//! - 0x18: user code (ring 3, selector 0x1B with RPL)
//! - 0x20: user data (ring 3, selector 0x23 with RPL)
//! - 0x28: TSS

use core::mem::size_of;

use spin::Mutex;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

const GDT_ENTRIES: usize = 6;

/// One 8-byte GDT descriptor in its raw, CPU-consumed form.
#[repr(C)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self { limit_low: 0, base_low: 0, base_mid: 0, access: 0, granularity: 0, base_high: 0 }
    }

    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (((limit >> 16) & 0x0F) as u8) | (flags << 4),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

/// 32-bit Task State Segment. Only the fields SpikeOS touches (`esp0`/`ss0`
/// for ring transitions) are meaningfully used; the rest exist because the
/// CPU reads the whole structure on a hardware task switch path we never
/// take, but some fields (iomap base) still must be valid.
#[repr(C, packed)]
pub struct Tss {
    prev_task: u16,
    _r0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _r1: u16,
    esp1: u32,
    ss1: u16,
    _r2: u16,
    esp2: u32,
    ss2: u16,
    _r3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _r4: u16,
    cs: u16,
    _r5: u16,
    ss: u16,
    _r6: u16,
    ds: u16,
    _r7: u16,
    fs: u16,
    _r8: u16,
    gs: u16,
    _r9: u16,
    ldt: u16,
    _r10: u16,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_task: 0,
            _r0: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR,
            _r1: 0,
            esp1: 0,
            ss1: 0,
            _r2: 0,
            esp2: 0,
            ss2: 0,
            _r3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _r4: 0,
            cs: 0,
            _r5: 0,
            ss: 0,
            _r6: 0,
            ds: 0,
            _r7: 0,
            fs: 0,
            _r8: 0,
            gs: 0,
            _r9: 0,
            ldt: 0,
            _r10: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

static GDT: Mutex<[GdtEntry; GDT_ENTRIES]> = Mutex::new([GdtEntry::null(); GDT_ENTRIES]);
static TSS: Mutex<Tss> = Mutex::new(Tss::new());

/// Build the GDT, install the TSS descriptor, and load `gdtr`/`tr`.
///
/// Must run once, early, before any ring-3 entry and before interrupts are
/// enabled.
pub fn init() {
    let tss_base = {
        let tss = TSS.lock();
        &*tss as *const Tss as u32
    };
    let tss_limit = (size_of::<Tss>() - 1) as u32;

    {
        let mut gdt = GDT.lock();
        gdt[0] = GdtEntry::null();
        // access=0x9A (present, ring0, code, exec/read), flags=0xC (4K gran, 32-bit)
        gdt[1] = GdtEntry::new(0, 0xFFFFF, 0x9A, 0xC);
        // access=0x92 (present, ring0, data, read/write)
        gdt[2] = GdtEntry::new(0, 0xFFFFF, 0x92, 0xC);
        // access=0xFA (present, ring3, code, exec/read)
        gdt[3] = GdtEntry::new(0, 0xFFFFF, 0xFA, 0xC);
        // access=0xF2 (present, ring3, data, read/write)
        gdt[4] = GdtEntry::new(0, 0xFFFFF, 0xF2, 0xC);
        // access=0x89 (present, ring0, 32-bit TSS available)
        gdt[5] = GdtEntry::new(tss_base, tss_limit, 0x89, 0x0);
    }

    let gdt_ptr = {
        let gdt = GDT.lock();
        GdtPointer {
            limit: (size_of::<[GdtEntry; GDT_ENTRIES]>() - 1) as u16,
            base: gdt.as_ptr() as u32,
        }
    };

    // SAFETY: gdt_ptr describes the GDT we just built; it stays alive for
    // the kernel's lifetime as a `static`. Reloading segment registers
    // after LGDT is required by the x86 ABI, and TSS_SELECTOR names the
    // descriptor installed above.
    unsafe {
        core::arch::asm!(
            "lgdt [{0}]",
            "mov ax, {1:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            "push {2:e}",
            "lea eax, [1f]",
            "push eax",
            "retf",
            "1:",
            "ltr {3:x}",
            in(reg) &gdt_ptr,
            in(reg) KERNEL_DATA_SELECTOR,
            const KERNEL_CODE_SELECTOR,
            in(reg) TSS_SELECTOR,
            out("eax") _,
        );
    }
}

/// Update `esp0` in the TSS. Called by the scheduler before resuming a
/// ring-3 process so the next ring3->ring0 trap lands on the right stack.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}

pub fn get_kernel_stack() -> u32 {
    TSS.lock().esp0
}
