//! ET_EXEC i386 ELF loader (C13).
//!
//! Builds a fresh address space for a user process by mapping each
//! PT_LOAD segment's pages, copying the segment's file bytes into them
//! through the single temp-map window, and handing the result to
//! [`crate::process::proc_create_user_process`].

use crate::config::{KERNEL_VMA_BASE, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::mm::{frame_allocator, paging};
use crate::process::pcb::Pid;

const EI_NIDENT: usize = 16;
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EM_386: u16 = 3;
const ET_EXEC: u16 = 2;
const PT_LOAD: u32 = 1;

/// One source an ELF image can be read from: an initrd physical range
/// (copied through `temp_map`) or a VFS file already resident as a
/// contiguous byte buffer.
pub enum Source<'a> {
    Initrd { phys_base: u32, len: usize },
    Bytes(&'a [u8]),
}

impl Source<'_> {
    fn len(&self) -> usize {
        match self {
            Source::Initrd { len, .. } => *len,
            Source::Bytes(b) => b.len(),
        }
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`. Bytes past
    /// the source's end are left as-is in `buf` (callers zero-init the
    /// staging page first).
    fn read_at(&self, offset: usize, buf: &mut [u8]) {
        match self {
            Source::Bytes(data) => {
                if offset >= data.len() {
                    return;
                }
                let n = buf.len().min(data.len() - offset);
                buf[..n].copy_from_slice(&data[offset..offset + n]);
            }
            Source::Initrd { phys_base, len } => {
                if offset >= *len {
                    return;
                }
                let n = buf.len().min(*len - offset);
                let mut copied = 0;
                while copied < n {
                    let phys = phys_base + (offset + copied) as u32;
                    let page_phys = phys & !((PAGE_SIZE as u32) - 1);
                    let page_off = (phys - page_phys) as usize;
                    let chunk = (PAGE_SIZE - page_off).min(n - copied);
                    let va = paging::temp_map(page_phys);
                    // SAFETY: temp_map just installed a valid mapping for
                    // page_phys at va; the read stays within the page.
                    unsafe {
                        core::ptr::copy_nonoverlapping(
                            (va + page_off) as *const u8,
                            buf[copied..].as_mut_ptr(),
                            chunk,
                        );
                    }
                    paging::temp_unmap();
                    copied += chunk;
                }
            }
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct Ehdr {
    e_ident: [u8; EI_NIDENT],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

const EHDR_SIZE: usize = core::mem::size_of::<Ehdr>();
const PHDR_SIZE: usize = core::mem::size_of::<Phdr>();

fn read_struct<T: Copy>(source: &Source, offset: usize, size: usize) -> T {
    let mut buf = [0u8; 64];
    debug_assert!(size <= buf.len());
    source.read_at(offset, &mut buf[..size]);
    // SAFETY: `T` is a `#[repr(C)]` POD header and `size == size_of::<T>()`
    // at every call site below; `buf` holds at least that many bytes.
    unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const T) }
}

/// Virtual page just below the kernel's higher half; the single user
/// stack page is mapped here.
const USER_STACK_PAGE: u32 = (KERNEL_VMA_BASE - PAGE_SIZE) as u32;

/// Validate, map, and spawn an ET_EXEC i386 image. Returns the new
/// process's pid.
pub fn load(source: Source, parent: Pid) -> KernelResult<Pid> {
    if source.len() < EHDR_SIZE {
        return Err(KernelError::InvalidArgument { name: "elf", value: "too short" });
    }
    let ehdr: Ehdr = read_struct(&source, 0, EHDR_SIZE);
    if ehdr.e_ident[4] != ELFCLASS32
        || ehdr.e_ident[5] != ELFDATA2LSB
        || ehdr.e_type != ET_EXEC
        || ehdr.e_machine != EM_386
        || ehdr.e_phnum == 0
    {
        return Err(KernelError::InvalidArgument { name: "elf", value: "not a valid ET_EXEC i386 image" });
    }

    let pd_phys = paging::pgdir_create()?;
    let mut brk_start: u32 = 0;

    for i in 0..ehdr.e_phnum {
        let off = ehdr.e_phoff as usize + i as usize * PHDR_SIZE;
        let phdr: Phdr = read_struct(&source, off, PHDR_SIZE);
        if phdr.p_type != PT_LOAD {
            continue;
        }
        if (phdr.p_vaddr as usize) >= KERNEL_VMA_BASE {
            return Err(KernelError::InvalidAddress { addr: phdr.p_vaddr as usize });
        }

        let start_page = phdr.p_vaddr & !(PAGE_SIZE as u32 - 1);
        let end = phdr.p_vaddr + phdr.p_memsz;
        let end_page = (end + PAGE_SIZE as u32 - 1) & !(PAGE_SIZE as u32 - 1);
        if end_page as usize > KERNEL_VMA_BASE {
            return Err(KernelError::InvalidAddress { addr: end_page as usize });
        }

        let mut va = start_page;
        while va < end_page {
            let frame = frame_allocator::alloc_frame_checked()?;
            paging::pgdir_map_user_page(pd_phys, va as usize, frame, paging::USER | paging::WRITABLE)?;

            let mut staging = [0u8; PAGE_SIZE];
            // Overlap of [va, va+PAGE_SIZE) with the segment's file-backed
            // range [p_vaddr, p_vaddr+p_filesz).
            let seg_file_start = phdr.p_vaddr;
            let seg_file_end = phdr.p_vaddr + phdr.p_filesz;
            let page_start = va;
            let page_end = va + PAGE_SIZE as u32;
            let copy_start = seg_file_start.max(page_start);
            let copy_end = seg_file_end.min(page_end);
            if copy_start < copy_end {
                let file_off = phdr.p_offset + (copy_start - phdr.p_vaddr);
                let dest_off = (copy_start - page_start) as usize;
                let len = (copy_end - copy_start) as usize;
                source.read_at(file_off as usize, &mut staging[dest_off..dest_off + len]);
            }

            let dest_va = paging::temp_map(frame);
            // SAFETY: temp_map just mapped `frame`; staging is exactly
            // one page.
            unsafe {
                core::ptr::copy_nonoverlapping(staging.as_ptr(), dest_va as *const u8 as *mut u8, PAGE_SIZE);
            }
            paging::temp_unmap();

            va += PAGE_SIZE as u32;
        }
        if end_page > brk_start {
            brk_start = end_page;
        }
    }

    let stack_frame = frame_allocator::alloc_frame_checked()?;
    paging::pgdir_map_user_page(pd_phys, USER_STACK_PAGE as usize, stack_frame, paging::USER | paging::WRITABLE)?;
    paging::zero_frame(stack_frame);

    let user_stack_top = USER_STACK_PAGE + PAGE_SIZE as u32;
    let pid = crate::process::proc_create_user_process(pd_phys, ehdr.e_entry, user_stack_top, parent)?;

    // The break starts right after the highest loaded segment; `brk()`
    // grows it a page at a time from here.
    let mut table = crate::process::table::PROCESS_TABLE.lock();
    if let Some(index) = table.find_index(pid) {
        table.slots[index].brk = brk_start as usize;
    }
    Ok(pid)
}
