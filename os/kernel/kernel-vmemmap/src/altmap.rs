//! # Device Page Map (altmap)
//!
//! Hot-added device memory can carry its own metadata: a frame range at the
//! start of the device is set aside and the vmemmap pages describing the
//! device are carved out of it with a bump cursor.
//!
//! ```text
//! base_pfn
//! ├─ reserve ─┼─ alloc + align ─┼──── nr_free() ────┤
//!             │                 └ next_pfn()         │
//!             └──────────────── free ────────────────┘
//! ```
//!
//! Allocations are never returned piecemeal; [`VmemAltmap::free_pfns`] only rolls
//! the allocation count back when a whole device range is torn down.

use crate::block::{Block, BlockSource};
use crate::error::AltmapError;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE};
use kernel_memory_addresses::{PageFrameNumber, align_up};
use log::{debug, warn};

static MISALIGNED_WARNED: AtomicBool = AtomicBool::new(false);

/// Bump allocator over a device-resident frame range.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VmemAltmap {
    base_pfn: PageFrameNumber,
    reserve: u64,
    free: u64,
    alloc: u64,
    align: u64,
}

impl VmemAltmap {
    /// An altmap at `base_pfn` that keeps `reserve` frames untouched and
    /// offers the following `free` frames for metadata.
    #[must_use]
    pub const fn new(base_pfn: PageFrameNumber, reserve: u64, free: u64) -> Self {
        Self {
            base_pfn,
            reserve,
            free,
            alloc: 0,
            align: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base_pfn(&self) -> PageFrameNumber {
        self.base_pfn
    }

    #[inline]
    #[must_use]
    pub const fn reserve(&self) -> u64 {
        self.reserve
    }

    #[inline]
    #[must_use]
    pub const fn free(&self) -> u64 {
        self.free
    }

    /// Frames handed out so far.
    #[inline]
    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.alloc
    }

    /// Frames skipped to keep allocations aligned.
    #[inline]
    #[must_use]
    pub const fn aligned(&self) -> u64 {
        self.align
    }

    /// The frame the next allocation starts at, before alignment.
    #[inline]
    #[must_use]
    pub const fn next_pfn(&self) -> PageFrameNumber {
        PageFrameNumber::new(self.base_pfn.as_u64() + self.reserve + self.alloc + self.align)
    }

    /// Frames still available to the cursor.
    #[inline]
    #[must_use]
    pub const fn nr_free(&self) -> u64 {
        self.free.saturating_sub(self.alloc + self.align)
    }

    /// Frames of the device range not usable as ordinary memory.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.reserve + self.free
    }

    /// Roll back `nr_pfns` allocated frames.
    pub fn free_pfns(&mut self, nr_pfns: u64) {
        debug_assert!(nr_pfns <= self.alloc);
        self.alloc = self.alloc.saturating_sub(nr_pfns);
    }

    /// Allocate `size` bytes from the device map.
    ///
    /// `size` must be a non-zero multiple of the page size. The block is
    /// aligned to the lowest set bit of its frame count: a 4-frame block
    /// starts on a multiple of 4, a 3-frame or 1-frame block anywhere, a
    /// 6-frame block on an even frame.
    pub fn alloc_block_buf(&mut self, size: u64) -> Result<Block, AltmapError> {
        if size == 0 || !size.is_multiple_of(PAGE_SIZE) {
            if !MISALIGNED_WARNED.swap(true, Ordering::Relaxed) {
                warn!("altmap_alloc_block_buf: allocations must be multiple of PAGE_SIZE ({size})");
            }
            return Err(AltmapError::Misaligned { size });
        }

        let pfn = self.next_pfn().as_u64();
        let nr_pfns = size >> PAGE_SHIFT;
        let nr_align = align_up(pfn, 1 << nr_pfns.trailing_zeros()) - pfn;
        let available = self.nr_free();
        if nr_pfns + nr_align > available {
            return Err(AltmapError::Exhausted {
                requested: nr_pfns + nr_align,
                available,
            });
        }

        self.alloc += nr_pfns;
        self.align += nr_align;
        let pfn = PageFrameNumber::new(pfn + nr_align);

        debug!(
            "altmap_alloc_block_buf: pfn: {pfn} alloc: {} align: {} nr: {nr_pfns:#x}",
            self.alloc, self.align
        );
        Ok(Block::new(pfn.page().base(), size, BlockSource::Altmap))
    }
}
