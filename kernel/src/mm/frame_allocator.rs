//! Physical frame allocator: a fixed-capacity bitmap over [`config::MAX_FRAMES`]
//! page frames.
//!
//! One bit per frame, set means allocated. No buddy system, no NUMA zones —
//! SpikeOS runs on a single CPU with a flat address space, and the bitmap
//! scan is cheap enough at hobby scale (a few thousand frames).

use spin::Mutex;

use crate::config::{MAX_FRAMES, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};

/// Sentinel returned by [`alloc_frame`]/[`alloc_frames_contiguous`] on
/// exhaustion. Distinct from physical address 0, which is a legitimate
/// frame (and is reserved at boot, so it is never actually handed out).
pub const FAIL: u32 = u32::MAX;

const WORDS: usize = MAX_FRAMES / 64;

struct Bitmap {
    words: [u64; WORDS],
}

impl Bitmap {
    const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    fn is_set(&self, bit: usize) -> bool {
        (self.words[bit / 64] >> (bit % 64)) & 1 != 0
    }

    fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    fn clear(&mut self, bit: usize) {
        self.words[bit / 64] &= !(1 << (bit % 64));
    }

    fn first_clear(&self) -> Option<usize> {
        (0..MAX_FRAMES).find(|&bit| !self.is_set(bit))
    }
}

static BITMAP: Mutex<Bitmap> = Mutex::new(Bitmap::new());

fn frame_to_phys(frame: usize) -> u32 {
    (frame * PAGE_SIZE) as u32
}

fn phys_to_frame(phys: u32) -> usize {
    phys as usize / PAGE_SIZE
}

/// Allocate a single physical frame. Returns [`FAIL`] if none are free.
pub fn alloc_frame() -> u32 {
    let was_enabled = crate::arch::irq_save();
    let result = {
        let mut bitmap = BITMAP.lock();
        match bitmap.first_clear() {
            Some(frame) => {
                bitmap.set(frame);
                frame_to_phys(frame)
            }
            None => FAIL,
        }
    };
    crate::arch::irq_restore(was_enabled);
    result
}

/// Allocate a single frame, returning a [`KernelError::OutOfFrames`] error
/// instead of the raw sentinel. Convenience wrapper for callers already
/// working in `KernelResult`.
pub fn alloc_frame_checked() -> KernelResult<u32> {
    match alloc_frame() {
        FAIL => Err(KernelError::OutOfFrames),
        phys => Ok(phys),
    }
}

/// Clear a frame's allocated bit. Double-free is a caller bug, not checked.
pub fn free_frame(phys: u32) {
    let was_enabled = crate::arch::irq_save();
    BITMAP.lock().clear(phys_to_frame(phys));
    crate::arch::irq_restore(was_enabled);
}

/// Find `count` consecutive free frames aligned to `align_frames`, mark
/// them all allocated atomically, and return the physical base address.
/// Returns [`FAIL`] if no such run exists.
pub fn alloc_frames_contiguous(count: usize, align_frames: usize) -> u32 {
    if count == 0 {
        return FAIL;
    }
    let was_enabled = crate::arch::irq_save();
    let result = {
        let mut bitmap = BITMAP.lock();
        let align = align_frames.max(1);
        let mut start = 0usize;
        let mut found = FAIL;
        while start + count <= MAX_FRAMES {
            if start % align != 0 {
                start += 1;
                continue;
            }
            let mut ok = true;
            for f in start..start + count {
                if bitmap.is_set(f) {
                    ok = false;
                    start = f + 1;
                    break;
                }
            }
            if ok {
                for f in start..start + count {
                    bitmap.set(f);
                }
                found = frame_to_phys(start);
                break;
            }
        }
        found
    };
    crate::arch::irq_restore(was_enabled);
    result
}

/// Mark every frame intersecting `[begin, end)` as permanently allocated.
/// Used once at boot to reserve the BIOS region and the kernel image.
pub fn reserve_region(begin: u32, end: u32) {
    let was_enabled = crate::arch::irq_save();
    {
        let mut bitmap = BITMAP.lock();
        let first = phys_to_frame(begin);
        let last = phys_to_frame(end.saturating_sub(1).max(begin));
        for f in first..=last.min(MAX_FRAMES - 1) {
            bitmap.set(f);
        }
    }
    crate::arch::irq_restore(was_enabled);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn alloc_then_free_reuses_frame() {
        let a = alloc_frame();
        assert_ne!(a, FAIL);
        free_frame(a);
        let b = alloc_frame();
        assert_eq!(a, b);
        free_frame(b);
    }

    #[test_case]
    fn contiguous_respects_alignment() {
        let base = alloc_frames_contiguous(4, 4);
        assert_ne!(base, FAIL);
        assert_eq!(phys_to_frame(base) % 4, 0);
        for i in 0..4 {
            free_frame(base + (i * PAGE_SIZE) as u32);
        }
    }
}
