//! # Block Allocation
//!
//! Backing memory for vmemmap page tables and metadata pages comes from one
//! of these places, tried in order:
//!
//! 1. the [`SparseBuffer`], a range reserved up front during early boot
//!    (`alloc_block_buf` only),
//! 2. the general page allocator, once it [is available](PageAllocator::is_available),
//! 3. the early-boot reserve allocator otherwise.
//!
//! Metadata pages for device memory come from the caller's [`VmemAltmap`]
//! instead; page tables never do.
//!
//! Every [`Block`] remembers its [`BlockSource`]. Pages released by the
//! remap path go back to the allocator that owns them.

use crate::altmap::VmemAltmap;
use crate::error::AllocError;
use crate::gfp::GfpFlags;
use crate::layout::get_order;
use crate::platform::{BootAllocator, BootLimit, BootRequest, NodeId, PageAllocator};
use crate::remap::VmemmapPageList;
use kernel_info::memory::MAX_DMA_PHYS_ADDRESS;
use kernel_memory_addresses::{PageFrameNumber, PhysicalAddress, PhysicalPage, Size4K};
use log::warn;

/// Where a [`Block`] was allocated from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlockSource {
    SparseBuffer,
    General,
    BootReserve,
    Altmap,
}

/// A physically contiguous, page-aligned extent of `size` bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Block {
    base: PhysicalAddress,
    size: u64,
    source: BlockSource,
}

impl Block {
    #[inline]
    #[must_use]
    pub const fn new(base: PhysicalAddress, size: u64, source: BlockSource) -> Self {
        Self { base, size, source }
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn source(&self) -> BlockSource {
        self.source
    }

    /// The first 4 KiB frame of the block.
    #[inline]
    #[must_use]
    pub const fn page(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(self.base)
    }

    #[inline]
    #[must_use]
    pub const fn pfn(&self) -> PageFrameNumber {
        self.page().pfn()
    }
}

/// Pre-reserved physical range used before any allocator is consulted.
///
/// Each request is placed at the next multiple of its own size; the gap in
/// front of it is skipped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SparseBuffer {
    next: u64,
    end: u64,
}

impl SparseBuffer {
    /// A buffer covering `[base, base + size)`.
    ///
    /// # Panics
    /// If `base + size` wraps the physical address space.
    #[must_use]
    pub const fn new(base: PhysicalAddress, size: u64) -> Self {
        let end = match base.as_u64().checked_add(size) {
            Some(end) => end,
            None => panic!("sparse buffer wraps the physical address space"),
        };
        Self {
            next: base.as_u64(),
            end,
        }
    }

    /// A buffer that never serves anything.
    #[must_use]
    pub const fn empty() -> Self {
        Self { next: 0, end: 0 }
    }

    /// Bytes left after the cursor.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.end - self.next
    }

    /// Carve `size` bytes aligned to `size` out of the buffer.
    pub fn alloc(&mut self, size: u64) -> Option<PhysicalAddress> {
        if size == 0 || self.remaining() == 0 {
            return None;
        }
        let ptr = self.next.div_ceil(size).checked_mul(size)?;
        if ptr.checked_add(size)? > self.end {
            return None;
        }
        self.next = ptr + size;
        Some(PhysicalAddress::new(ptr))
    }
}

impl Default for SparseBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

/// Chooses the allocator backing each vmemmap block.
///
/// Owns both allocators for the duration of populate and remap calls.
#[derive(Debug)]
pub struct BlockAllocator<G, B> {
    general: G,
    boot: B,
    buffer: SparseBuffer,
    warned: bool,
}

impl<G: PageAllocator, B: BootAllocator> BlockAllocator<G, B> {
    #[must_use]
    pub const fn new(general: G, boot: B) -> Self {
        Self {
            general,
            boot,
            buffer: SparseBuffer::empty(),
            warned: false,
        }
    }

    /// Serve `alloc_block_buf` requests from `buffer` first.
    #[must_use]
    pub fn with_sparse_buffer(mut self, buffer: SparseBuffer) -> Self {
        self.buffer = buffer;
        self
    }

    #[inline]
    #[must_use]
    pub const fn sparse_buffer(&self) -> &SparseBuffer {
        &self.buffer
    }

    /// Stop using the sparse buffer and hand back what is left of it.
    pub fn take_sparse_buffer(&mut self) -> SparseBuffer {
        core::mem::take(&mut self.buffer)
    }

    #[inline]
    #[must_use]
    pub const fn general(&self) -> &G {
        &self.general
    }

    #[inline]
    pub const fn general_mut(&mut self) -> &mut G {
        &mut self.general
    }

    #[inline]
    #[must_use]
    pub const fn boot(&self) -> &B {
        &self.boot
    }

    /// Release both allocators.
    #[must_use]
    pub fn into_parts(self) -> (G, B) {
        (self.general, self.boot)
    }

    /// Allocate `size` bytes on `node` from the general allocator, or from the
    /// boot reserve while the general allocator is not yet available.
    ///
    /// The block is not zeroed.
    pub fn alloc_block(&mut self, size: u64, node: NodeId) -> Result<Block, AllocError> {
        if self.general.is_available() {
            let gfp = GfpFlags::VMEMMAP_BLOCK;
            let order = get_order(size);
            if let Some(page) = self.general.alloc_pages_node(node, gfp, order) {
                return Ok(Block::new(page.base(), size, BlockSource::General));
            }

            if !self.warned {
                warn!(
                    "vmemmap alloc failure: order:{order}, mode:{:?}, {node}",
                    gfp - GfpFlags::NOWARN
                );
                self.warned = true;
            }
            return Err(AllocError::GeneralAllocator { order, node });
        }

        let request = BootRequest {
            size,
            align: size,
            goal: PhysicalAddress::new(MAX_DMA_PHYS_ADDRESS),
            limit: BootLimit::Accessible,
            node,
        };
        self.boot
            .alloc_try_nid_raw(request)
            .map(|base| Block::new(base, size, BlockSource::BootReserve))
            .ok_or(AllocError::BootReserve { size, node })
    }

    /// Allocate a metadata block: from `altmap` if given, else from the sparse
    /// buffer, else as [`alloc_block`](Self::alloc_block).
    pub fn alloc_block_buf(
        &mut self,
        size: u64,
        node: NodeId,
        altmap: Option<&mut VmemAltmap>,
    ) -> Result<Block, AllocError> {
        if let Some(altmap) = altmap {
            return Ok(altmap.alloc_block_buf(size)?);
        }
        if let Some(base) = self.buffer.alloc(size) {
            return Ok(Block::new(base, size, BlockSource::SparseBuffer));
        }
        self.alloc_block(size, node)
    }

    /// Return a displaced metadata page to the allocator that owns it.
    pub fn release_page(&mut self, page: PhysicalPage<Size4K>) {
        if self.boot.is_reserved(page) {
            self.boot.free_bootmem_page(page);
        } else {
            self.general.free_pages(page, 0);
        }
    }

    /// Release every page in `pages`, in list order.
    pub fn release_page_list(&mut self, pages: VmemmapPageList) {
        for page in pages {
            self.release_page(page.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_buffer_aligns_to_request_size() {
        let mut buf = SparseBuffer::new(PhysicalAddress::new(0x1000), 0x8000);
        assert_eq!(buf.alloc(0x1000), Some(PhysicalAddress::new(0x1000)));
        assert_eq!(buf.alloc(0x2000), Some(PhysicalAddress::new(0x2000)));
        assert_eq!(buf.alloc(0x4000), Some(PhysicalAddress::new(0x4000)));
        assert_eq!(buf.remaining(), 0x1000);
        assert_eq!(buf.alloc(0x2000), None);
        assert_eq!(buf.alloc(0x1000), Some(PhysicalAddress::new(0x8000)));
        assert_eq!(buf.remaining(), 0);
        assert_eq!(buf.alloc(0x1000), None);
    }

    #[test]
    fn sparse_buffer_may_end_just_below_the_top_of_memory() {
        let buf = SparseBuffer::new(PhysicalAddress::new(u64::MAX - 0x1FFF), 0x1000);
        assert_eq!(buf.remaining(), 0x1000);
    }

    #[test]
    #[should_panic(expected = "sparse buffer wraps")]
    fn sparse_buffer_must_not_wrap() {
        let _ = SparseBuffer::new(PhysicalAddress::new(u64::MAX - 0x1FFF), 0x2000);
    }

    #[test]
    fn empty_sparse_buffer_serves_nothing() {
        let mut buf = SparseBuffer::default();
        assert_eq!(buf.alloc(0x1000), None);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn block_accessors() {
        let block = Block::new(PhysicalAddress::new(0x7000), 0x1000, BlockSource::General);
        assert_eq!(block.pfn(), PageFrameNumber::new(7));
        assert_eq!(block.page().base(), block.base());
        assert_eq!(block.size(), 0x1000);
    }
}
