//! Multiboot entry stub and the four boot-time page tables it builds
//! before `mm::paging_init` takes over.
//!
//! Everything here lives in the unrelocated `.boot` linker section (see
//! `link.ld`): its load address equals its link address, so the raw
//! `mov reg, label` references below are valid the instant the CPU starts
//! executing them, long before paging turns virtual and physical
//! addresses into two different things.

use core::arch::global_asm;

const ENTRIES: usize = 1024;
const BOOT_STACK_SIZE: usize = 16 * 1024;

#[repr(align(4096))]
struct PageTable([u32; ENTRIES]);

#[no_mangle]
#[link_section = ".bss.boot"]
static mut BOOT_PD: PageTable = PageTable([0; ENTRIES]);
#[no_mangle]
#[link_section = ".bss.boot"]
static mut BOOT_IDENTITY_PT: PageTable = PageTable([0; ENTRIES]);
#[no_mangle]
#[link_section = ".bss.boot"]
static mut BOOT_HEAP_PT: PageTable = PageTable([0; ENTRIES]);
#[no_mangle]
#[link_section = ".bss.boot"]
static mut BOOT_FB_PT: PageTable = PageTable([0; ENTRIES]);

#[no_mangle]
#[link_section = ".bss.boot"]
static mut BOOT_STACK: [u8; BOOT_STACK_SIZE] = [0; BOOT_STACK_SIZE];

/// Physical address of each boot page table, read once by `kernel_entry`
/// and handed to `mm::init`. Valid for the kernel's whole lifetime since
/// PDE[0]/PDE[768] keep this low region identity-mapped forever.
pub fn boot_tables_phys() -> (u32, u32, u32, u32) {
    // SAFETY: these are plain address-of reads of `static`s that are never
    // mutated again after `_start`'s one-time setup.
    unsafe {
        (
            core::ptr::addr_of!(BOOT_PD) as u32,
            core::ptr::addr_of!(BOOT_IDENTITY_PT) as u32,
            core::ptr::addr_of!(BOOT_HEAP_PT) as u32,
            core::ptr::addr_of!(BOOT_FB_PT) as u32,
        )
    }
}

// The lib crate's own `cargo test --lib` harness defines its own `_start`
// (see `lib.rs`) and must not link this one in. `tests/*.rs` integration
// binaries do NOT define their own entry point: they link this same asm
// and `bootstrap::kernel_entry`, and hook into it by exporting `test_entry`
// (see `bootstrap::kernel_entry`'s `test-kernel` branch).
#[cfg(not(test))]
global_asm!(
    r#"
.section .text.entry, "ax"
.global _start
_start:
    mov esp, BOOT_STACK + {stack_size}
    mov esi, eax

    mov edi, BOOT_IDENTITY_PT
    xor ecx, ecx
.Lfill_identity:
    mov edx, ecx
    shl edx, 12
    or edx, 3
    mov [edi + ecx*4], edx
    inc ecx
    cmp ecx, 1024
    jne .Lfill_identity

    mov edi, BOOT_PD
    mov eax, BOOT_IDENTITY_PT
    or eax, 3
    mov [edi], eax
    mov [edi + 768*4], eax

    mov eax, BOOT_HEAP_PT
    or eax, 3
    mov [edi + 769*4], eax

    mov eax, BOOT_FB_PT
    or eax, 3
    mov [edi + 770*4], eax

    mov eax, BOOT_PD
    mov cr3, eax
    mov eax, cr0
    or eax, 0x80000000
    mov cr0, eax

    push ebx
    push esi
    mov eax, kernel_entry
    call eax
.Lhang:
    hlt
    jmp .Lhang
"#,
    stack_size = const BOOT_STACK_SIZE,
);
