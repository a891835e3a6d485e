//! Kernel-wide configuration constants.
//!
//! Centralizes the magic numbers that would otherwise be scattered across
//! `mm`, `process`, and `fs` so the boot-time layout and resource caps are
//! visible in one place.

/// Size of a physical page / virtual page.
pub const PAGE_SIZE: usize = 4096;

/// Bits tracked by the frame bitmap. Covers at least 64 MiB of physical RAM.
pub const MAX_FRAMES: usize = 16384;

/// Virtual base of the higher half. PDE[KERNEL_PDE_BASE] anchors it.
pub const KERNEL_VMA_BASE: usize = 0xC000_0000;

/// PDE index of the higher-half anchor (`0xC0000000 >> 22`).
pub const KERNEL_PDE_BASE: usize = 768;

/// PDE index reserved for the kernel heap region.
pub const HEAP_PDE: usize = 769;

/// PDE index reserved for the framebuffer region.
pub const FRAMEBUFFER_PDE: usize = 770;

/// First PDE index handed out by `map_mmio_region`.
pub const MMIO_PDE_BASE: usize = 771;

/// Virtual address of the single temporary-mapping page.
pub const TEMP_MAP_VADDR: usize = 0xC03F_F000;

/// Kernel heap start (inside the PDE 769 window).
pub const HEAP_START: usize = KERNEL_VMA_BASE + 4 * 1024 * 1024;

/// Upper bound the kernel heap may grow to.
pub const HEAP_MAX: usize = 16 * 1024 * 1024;

/// Minimum payload alignment guaranteed by `kmalloc`.
pub const HEAP_ALIGN: usize = 16;

/// Fixed-size process table capacity.
pub const MAX_PROCESSES: usize = 64;

/// Bytes reserved for each process's kernel stack.
pub const KSTACK_SIZE: usize = PAGE_SIZE;

/// Per-process open file-descriptor table size.
pub const MAX_FDS: usize = 32;

/// Initial inode table capacity; doubles on demand up to `MAX_INODES`.
pub const INITIAL_INODE_CAPACITY: usize = 64;

/// Hard cap on inode table growth.
pub const MAX_INODES: usize = 4096;

/// Initial directory entry array capacity; doubles on demand.
pub const INITIAL_DIRENT_CAPACITY: usize = 8;

/// Bytes in a single pipe's ring buffer.
pub const PIPE_BUFFER_SIZE: usize = 4096;

/// Global pool of open-file objects shared by all processes.
pub const MAX_OPEN_FILES: usize = 256;

/// Global pool of pipe objects.
pub const MAX_PIPES: usize = 64;

/// PIT tick frequency the timer driver is programmed for.
pub const TICK_HZ: u32 = 100;

/// Number of slots in the sleep wheel (one second of ticks at `TICK_HZ`).
pub const SLEEP_WHEEL_SLOTS: usize = 128;

/// Sectors reserved for the SpikeFS superblock/header.
pub const SPIKEFS_HEADER_SECTORS: u32 = 1;

/// Magic value stamped into the SpikeFS header to validate an image.
pub const SPIKEFS_MAGIC: u32 = 0x5350_494B; // "SPIK"

/// Sector size of the backing ATA device.
pub const SECTOR_SIZE: usize = 512;

/// Hard cap on how far a single process's break may grow, measured from
/// its initial post-ELF-load value.
pub const USER_BRK_MAX_GROWTH: usize = 8 * 1024 * 1024;

/// Fixed window for anonymous `mmap`, one page below the user stack page.
pub const USER_MMAP_BASE: usize = KERNEL_VMA_BASE - 2 * 1024 * 1024;

/// Upper bound of the `mmap` window (exclusive); stays below the stack page.
pub const USER_MMAP_END: usize = KERNEL_VMA_BASE - PAGE_SIZE;
