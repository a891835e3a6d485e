//! Physical memory, paging, and the kernel heap (C2, C3, C4).

pub mod frame_allocator;
pub mod heap;
pub mod paging;

#[global_allocator]
static ALLOCATOR: heap::KernelAllocator = heap::KernelAllocator;

/// Bring up physical memory management: reserve BIOS + kernel image
/// frames, install the kernel's own page directory, then start the heap.
///
/// `kernel_image_end` is the physical end address of the loaded kernel
/// image (the linker's `kernel_end_phys` symbol), used to reserve those
/// frames so the frame allocator never hands them back out.
pub fn init(kernel_pd_phys: u32, identity_pt: u32, heap_pt: u32, fb_pt: u32, kernel_image_end: u32) {
    frame_allocator::reserve_region(0, 0x10_0000); // BIOS / real-mode region below 1 MiB
    frame_allocator::reserve_region(0x10_0000, kernel_image_end);
    paging::paging_init(kernel_pd_phys, identity_pt, heap_pt, fb_pt);
    crate::arch::x86::interrupts::register_exception_handler(14, paging::page_fault_handler);
    heap::init();
}
