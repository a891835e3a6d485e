//! Two-level x86 paging: page directories, page tables, the temporary
//! mapping window, MMIO region allocation, and per-process address spaces.

use spin::Mutex;

use crate::arch;
use crate::config::{
    FRAMEBUFFER_PDE, HEAP_PDE, KERNEL_PDE_BASE, MMIO_PDE_BASE, PAGE_SIZE, TEMP_MAP_VADDR,
};
use crate::error::{KernelError, KernelResult};
use crate::mm::frame_allocator::{self, FAIL};

pub const PRESENT: u32 = 1 << 0;
pub const WRITABLE: u32 = 1 << 1;
pub const USER: u32 = 1 << 2;
pub const CACHE_DISABLE: u32 = 1 << 4;

const ENTRIES: usize = 1024;

/// Physical address of the kernel's page directory, fixed at link time by
/// the boot assembly. Every other page directory is a clone of this one's
/// upper half.
static KERNEL_PD_PHYS: Mutex<u32> = Mutex::new(0);

/// Physical addresses of the three statically allocated kernel page tables
/// (identity/higher-half, heap, framebuffer). `pgdir_map_user_page` and
/// `pgdir_destroy` use these, not the USER flag, to decide whether a PDE
/// points at shared kernel state (per spec: the USER bit is not a reliable
/// signal here).
static KERNEL_PT_PHYS: Mutex<[u32; 3]> = Mutex::new([0; 3]);

static NEXT_MMIO_PDE: Mutex<usize> = Mutex::new(MMIO_PDE_BASE);

/// Set once paging is live (CR3 valid, higher half mapped).
static PAGING_READY: Mutex<bool> = Mutex::new(false);

/// A single temp-map slot. Not reentrant: acquiring it disables interrupts
/// and the caller must release it before doing anything that could fault
/// or call back into paging.
static TEMP_MAP_LOCK: Mutex<()> = Mutex::new(());

fn pd_index(va: usize) -> usize {
    (va >> 22) & 0x3FF
}

fn pt_index(va: usize) -> usize {
    (va >> 12) & 0x3FF
}

/// Read the page-directory entry at `index` of the PD at `pd_phys` via the
/// temp-map window.
fn read_pde(pd_phys: u32, index: usize) -> u32 {
    let va = temp_map(pd_phys);
    // SAFETY: `va` is a valid mapping of `pd_phys`, a page-directory frame.
    let value = unsafe { *((va as *const u32).add(index)) };
    temp_unmap();
    value
}

fn write_pde(pd_phys: u32, index: usize, value: u32) {
    let va = temp_map(pd_phys);
    // SAFETY: see `read_pde`.
    unsafe { *((va as *mut u32).add(index)) = value };
    temp_unmap();
}

/// Bring up the kernel's own address space: identity-map the first 4 MiB
/// at both low VA and the higher-half base using one boot page table, and
/// install two further boot PTs (heap, framebuffer) so their PDEs always
/// exist.
pub fn paging_init(kernel_pd_phys: u32, identity_pt_phys: u32, heap_pt_phys: u32, fb_pt_phys: u32) {
    *KERNEL_PD_PHYS.lock() = kernel_pd_phys;
    *KERNEL_PT_PHYS.lock() = [identity_pt_phys, heap_pt_phys, fb_pt_phys];

    for frame in 0..ENTRIES {
        let phys = (frame * PAGE_SIZE) as u32;
        write_pte_raw(identity_pt_phys, frame, phys | PRESENT | WRITABLE);
    }
    write_pde(kernel_pd_phys, 0, identity_pt_phys | PRESENT | WRITABLE);
    write_pde(kernel_pd_phys, KERNEL_PDE_BASE, identity_pt_phys | PRESENT | WRITABLE);
    write_pde(kernel_pd_phys, HEAP_PDE, heap_pt_phys | PRESENT | WRITABLE);
    write_pde(kernel_pd_phys, FRAMEBUFFER_PDE, fb_pt_phys | PRESENT | WRITABLE | CACHE_DISABLE);

    // SAFETY: kernel_pd_phys is a fully built page directory whose PDE 0
    // and PDE[KERNEL_PDE_BASE] both identity-map the running code, so the
    // switch does not fault on the next instruction.
    unsafe { arch::set_cr3(kernel_pd_phys) };
    *PAGING_READY.lock() = true;
}

fn write_pte_raw(pt_phys: u32, index: usize, value: u32) {
    let va = temp_map(pt_phys);
    // SAFETY: `va` maps `pt_phys`, a page-table frame, for the duration of
    // this write.
    unsafe { *((va as *mut u32).add(index)) = value };
    temp_unmap();
}

fn read_pte_raw(pt_phys: u32, index: usize) -> u32 {
    let va = temp_map(pt_phys);
    // SAFETY: see `write_pte_raw`.
    let value = unsafe { *((va as *const u32).add(index)) };
    temp_unmap();
    value
}

/// Walk the current address space. Returns 0 on any missing entry; this is
/// a debug/introspection path, never used on a hot path.
pub fn virt_to_phys(va: usize) -> u32 {
    let pd_phys = *KERNEL_PD_PHYS.lock();
    let pde = read_pde(pd_phys, pd_index(va));
    if pde & PRESENT == 0 {
        return 0;
    }
    let pt_phys = pde & !0xFFF;
    let pte = read_pte_raw(pt_phys, pt_index(va));
    if pte & PRESENT == 0 {
        return 0;
    }
    (pte & !0xFFF) | (va as u32 & 0xFFF)
}

/// Map `va` to `phys` in the kernel's own address space, allocating a new
/// page table frame if the covering PDE is not yet present.
pub fn map_page(va: usize, phys: u32, flags: u32) -> KernelResult<()> {
    let pd_phys = *KERNEL_PD_PHYS.lock();
    map_page_in(pd_phys, va, phys, flags)
}

fn map_page_in(pd_phys: u32, va: usize, phys: u32, flags: u32) -> KernelResult<()> {
    let idx = pd_index(va);
    let mut pde = read_pde(pd_phys, idx);
    if pde & PRESENT == 0 {
        let pt_phys = frame_allocator::alloc_frame();
        if pt_phys == FAIL {
            return Err(KernelError::OutOfFrames);
        }
        zero_frame(pt_phys);
        pde = pt_phys | PRESENT | WRITABLE | (flags & USER);
        write_pde(pd_phys, idx, pde);
    }
    let pt_phys = pde & !0xFFF;
    write_pte_raw(pt_phys, pt_index(va), (phys & !0xFFF) | flags | PRESENT);
    arch::tlb_invalidate(va);
    Ok(())
}

pub fn zero_frame(phys: u32) {
    let va = temp_map(phys);
    // SAFETY: `va` maps a freshly allocated frame for the duration of the
    // zeroing write; nothing else can observe it mid-zero because temp_map
    // holds the single-slot lock.
    unsafe { core::ptr::write_bytes(va as *mut u8, 0, PAGE_SIZE) };
    temp_unmap();
}

/// Map `phys` at the single kernel temp-map slot and return its virtual
/// address. Not reentrant — callers must pair every `temp_map` with a
/// `temp_unmap` before any nested call.
pub fn temp_map(phys: u32) -> usize {
    // Leaked guard: released by `temp_unmap`. This module is the only
    // caller of both, always in strict LIFO pairs within a single
    // function, so the non-lexical lock lifetime is intentional here.
    core::mem::forget(TEMP_MAP_LOCK.lock());
    let pd_phys = *KERNEL_PD_PHYS.lock();
    let idx = pd_index(TEMP_MAP_VADDR);
    let pde = {
        // Avoid recursing into read_pde (which itself calls temp_map).
        // The temp-map PDE is set up once during paging_init's heap PT and
        // is always present afterward, so a direct physical read via the
        // boot identity map suffices.
        let va = TEMP_MAP_VADDR & !0x3FF_FFF;
        let _ = va;
        pde_direct(pd_phys, idx)
    };
    let pt_phys = pde & !0xFFF;
    pte_write_direct(pt_phys, pt_index(TEMP_MAP_VADDR), (phys & !0xFFF) | PRESENT | WRITABLE);
    arch::tlb_invalidate(TEMP_MAP_VADDR);
    TEMP_MAP_VADDR
}

pub fn temp_unmap() {
    let pd_phys = *KERNEL_PD_PHYS.lock();
    let idx = pd_index(TEMP_MAP_VADDR);
    let pde = pde_direct(pd_phys, idx);
    let pt_phys = pde & !0xFFF;
    pte_write_direct(pt_phys, pt_index(TEMP_MAP_VADDR), 0);
    arch::tlb_invalidate(TEMP_MAP_VADDR);
    // SAFETY: paired with the `forget`'d lock acquired in `temp_map`; this
    // is the one place that releases it.
    unsafe { TEMP_MAP_LOCK.force_unlock() };
}

/// Direct physical-memory access via the permanent identity map installed
/// by `paging_init` (PDE 0 / PDE[KERNEL_PDE_BASE] cover the first 4 MiB 1:1
/// at the low addresses), used only by `temp_map`/`temp_unmap` themselves
/// to avoid infinite recursion.
fn pde_direct(pd_phys: u32, index: usize) -> u32 {
    // SAFETY: the first 4 MiB of physical memory is identity-mapped at VA
    // == PA for the kernel's whole lifetime, and pd_phys always lies in
    // that range (it is allocated during early boot before the heap grows
    // past 4 MiB).
    unsafe { *((pd_phys as *const u32).add(index)) }
}

fn pte_write_direct(pt_phys: u32, index: usize, value: u32) {
    // SAFETY: see `pde_direct`.
    unsafe { *((pt_phys as *mut u32).add(index)) = value };
}

/// Reserve the next unused kernel PDE and map `size` bytes starting at
/// `phys_base` into it with caching disabled. Returns the virtual address
/// corresponding to `phys_base` (preserving any sub-page offset).
pub fn map_mmio_region(phys_base: u32, size: usize) -> KernelResult<usize> {
    let mut next = NEXT_MMIO_PDE.lock();
    if *next >= ENTRIES {
        return Err(KernelError::ResourceExhausted { resource: "mmio PDE space" });
    }
    let pde_idx = *next;
    *next += 1;
    drop(next);

    let base_page = phys_base & !0xFFF;
    let offset = (phys_base - base_page) as usize;
    let pages = (offset + size).div_ceil(PAGE_SIZE);

    let pt_phys = frame_allocator::alloc_frame_checked()?;
    zero_frame(pt_phys);
    let pd_phys = *KERNEL_PD_PHYS.lock();
    write_pde(pd_phys, pde_idx, pt_phys | PRESENT | WRITABLE);

    let region_va = pde_idx << 22;
    for i in 0..pages {
        write_pte_raw(
            pt_phys,
            i,
            (base_page + (i * PAGE_SIZE) as u32) | PRESENT | WRITABLE | CACHE_DISABLE,
        );
        arch::tlb_invalidate(region_va + i * PAGE_SIZE);
    }
    Ok(region_va + offset)
}

/// Allocate a fresh page directory that shares the kernel's PDEs and has
/// empty user slots.
pub fn pgdir_create() -> KernelResult<u32> {
    let pd_phys = frame_allocator::alloc_frame_checked()?;
    zero_frame(pd_phys);
    let kernel_pd = *KERNEL_PD_PHYS.lock();
    for idx in 0..ENTRIES {
        let pde = read_pde(kernel_pd, idx);
        if pde & PRESENT != 0 {
            write_pde(pd_phys, idx, pde);
        }
    }
    Ok(pd_phys)
}

fn is_shared_kernel_pt(pt_phys: u32) -> bool {
    KERNEL_PT_PHYS.lock().contains(&pt_phys)
}

/// Map a user page into `pd_phys`, cloning the covering page table first
/// if it currently points at a shared kernel PT (copy-on-user-touch).
pub fn pgdir_map_user_page(pd_phys: u32, va: usize, phys: u32, flags: u32) -> KernelResult<()> {
    let idx = pd_index(va);
    let pde = read_pde(pd_phys, idx);
    let pt_phys = pde & !0xFFF;

    if pde & PRESENT != 0 && is_shared_kernel_pt(pt_phys) {
        let clone_phys = frame_allocator::alloc_frame_checked()?;
        let src_va = temp_map(pt_phys);
        // SAFETY: src_va maps the shared kernel PT for a byte-for-byte
        // copy into the freshly allocated clone frame.
        let src: [u32; ENTRIES] = unsafe { *(src_va as *const [u32; ENTRIES]) };
        temp_unmap();
        let dst_va = temp_map(clone_phys);
        // SAFETY: dst_va maps the new, exclusively-owned clone frame.
        unsafe { *(dst_va as *mut [u32; ENTRIES]) = src };
        temp_unmap();
        write_pde(pd_phys, idx, clone_phys | PRESENT | WRITABLE | USER);
        return map_page_in(pd_phys, va, phys, flags | USER);
    }

    map_page_in(pd_phys, va, phys, flags | USER)
}

/// Unmap a single user page from `pd_phys` and free its backing frame.
/// No-op if the page was not present. Used by `munmap` and by `brk`
/// shrinking the break.
pub fn pgdir_unmap_user_page(pd_phys: u32, va: usize) {
    let idx = pd_index(va);
    let pde = read_pde(pd_phys, idx);
    if pde & PRESENT == 0 {
        return;
    }
    let pt_phys = pde & !0xFFF;
    let pte = read_pte_raw(pt_phys, pt_index(va));
    if pte & PRESENT == 0 {
        return;
    }
    write_pte_raw(pt_phys, pt_index(va), 0);
    frame_allocator::free_frame(pte & !0xFFF);
    arch::tlb_invalidate(va);
}

/// Tear down a process's address space: free every user PT's target
/// frames and the PT itself, skipping PDEs that alias a shared kernel PT,
/// then free the PD frame. The caller must have already switched CR3 away
/// from `pd_phys`.
pub fn pgdir_destroy(pd_phys: u32) {
    for idx in 0..ENTRIES {
        let pde = read_pde(pd_phys, idx);
        if pde & PRESENT == 0 {
            continue;
        }
        let pt_phys = pde & !0xFFF;
        if idx >= KERNEL_PDE_BASE && is_shared_kernel_pt(pt_phys) {
            continue;
        }
        for pte_idx in 0..ENTRIES {
            let pte = read_pte_raw(pt_phys, pte_idx);
            if pte & PRESENT != 0 {
                frame_allocator::free_frame(pte & !0xFFF);
            }
        }
        frame_allocator::free_frame(pt_phys);
    }
    frame_allocator::free_frame(pd_phys);
}

/// Physical address of the kernel's own page directory (CR3 value used
/// when no process is running, e.g. during `proc_kill` self-teardown).
pub fn kernel_pd_phys() -> u32 {
    *KERNEL_PD_PHYS.lock()
}

/// CPU page-fault handler, registered against vector 14.
pub fn page_fault_handler(tf: &mut crate::arch::TrapFrame) {
    let fault_addr = arch::get_fault_addr();
    if tf.from_user() {
        crate::log_service::klog(
            crate::log_service::LogLevel::Warn,
            "mm",
            "user page fault",
        );
        crate::process::signal::raise_on_current(crate::process::signal::SIGSEGV);
        let _ = fault_addr;
    } else {
        panic!(
            "kernel page fault at 0x{:x} (eip=0x{:x}, err=0x{:x})",
            fault_addr, tf.eip, tf.err_code
        );
    }
}
