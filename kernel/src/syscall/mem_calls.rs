//! brk/mmap/munmap syscalls: anonymous mappings in the current user page
//! directory.

use crate::config::{PAGE_SIZE, USER_MMAP_BASE, USER_MMAP_END};
use crate::error::{KernelError, KernelResult};
use crate::mm::{frame_allocator, paging};
use crate::process::table::PROCESS_TABLE;

fn page_align_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Grow or shrink the caller's break. `new_brk == 0` just queries the
/// current value. Shrinking unmaps and frees the pages given back;
/// growing maps fresh zeroed pages one at a time.
pub fn sys_brk(index: usize, new_brk: u32) -> KernelResult<i32> {
    let mut table = PROCESS_TABLE.lock();
    let pd_phys = table.slots[index].cr3;
    let old_brk = table.slots[index].brk;

    if new_brk == 0 {
        return Ok(old_brk as i32);
    }
    let new_brk = new_brk as usize;
    if new_brk >= USER_MMAP_BASE {
        return Err(KernelError::ResourceExhausted { resource: "user break" });
    }

    let old_top = page_align_up(old_brk);
    let new_top = page_align_up(new_brk);

    if new_top > old_top {
        let mut va = old_top;
        while va < new_top {
            let frame = frame_allocator::alloc_frame_checked()?;
            paging::pgdir_map_user_page(pd_phys, va, frame, paging::USER | paging::WRITABLE)?;
            paging::zero_frame(frame);
            va += PAGE_SIZE;
        }
    } else if new_top < old_top {
        let mut va = new_top;
        while va < old_top {
            paging::pgdir_unmap_user_page(pd_phys, va);
            va += PAGE_SIZE;
        }
    }

    table.slots[index].brk = new_brk;
    Ok(new_brk as i32)
}

/// Anonymous mapping of `len` bytes (rounded up to whole pages) inside the
/// fixed `mmap` window. No bookkeeping beyond the mapping itself — there
/// is one window per process and it never reuses freed ranges, matching
/// the allocator's hobby-scale "no reclaim list" stance.
pub fn sys_mmap(index: usize, len: usize, _prot: u32) -> KernelResult<i32> {
    let mut table = PROCESS_TABLE.lock();
    let pd_phys = table.slots[index].cr3;
    let cursor = table.slots[index].mmap_cursor;
    let size = page_align_up(len);
    if size == 0 {
        return Err(KernelError::InvalidArgument { name: "mmap", value: "zero length" });
    }
    let end = cursor + size;
    if end > USER_MMAP_END {
        return Err(KernelError::ResourceExhausted { resource: "mmap window" });
    }

    let mut va = cursor;
    while va < end {
        let frame = frame_allocator::alloc_frame_checked()?;
        paging::pgdir_map_user_page(pd_phys, va, frame, paging::USER | paging::WRITABLE)?;
        paging::zero_frame(frame);
        va += PAGE_SIZE;
    }

    table.slots[index].mmap_cursor = end;
    Ok(cursor as i32)
}

pub fn sys_munmap(index: usize, addr: usize, len: usize) -> KernelResult<i32> {
    let table = PROCESS_TABLE.lock();
    let pd_phys = table.slots[index].cr3;
    drop(table);

    if addr < USER_MMAP_BASE || addr >= USER_MMAP_END {
        return Err(KernelError::InvalidAddress { addr });
    }
    let size = page_align_up(len);
    let mut va = addr & !(PAGE_SIZE - 1);
    let end = va + size;
    while va < end {
        paging::pgdir_unmap_user_page(pd_phys, va);
        va += PAGE_SIZE;
    }
    Ok(0)
}
