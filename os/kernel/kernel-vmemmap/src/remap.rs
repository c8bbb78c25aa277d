//! # Remap Engines
//!
//! [`Vmemmap::remap_free`] folds a range of metadata pages onto the page
//! immediately in front of it and releases the displaced frames;
//! [`Vmemmap::remap_alloc`] undoes that with fresh copies.
//!
//! Frames in flight are held as [`VmemmapPage`]s in a [`VmemmapPageList`].
//! A `VmemmapPage` cannot be copied, so a frame is either mapped, queued in
//! exactly one list, or handed back to its allocator.

use crate::block::BlockAllocator;
use crate::error::VmemmapError;
use crate::gfp::GfpFlags;
use crate::layout::page_to_pfn;
use crate::platform::{BootAllocator, PageAllocator};
use crate::walk::{RemapPte, ReusePage};
use crate::Vmemmap;
use alloc::collections::VecDeque;
use alloc::collections::vec_deque;
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{PhysMapper, PtEntry};
use log::{debug, trace};

/// An owned vmemmap frame that is not currently mapped.
#[derive(Debug, Eq, PartialEq)]
pub struct VmemmapPage(PhysicalPage<Size4K>);

impl VmemmapPage {
    /// Take ownership of `page`.
    #[inline]
    #[must_use]
    pub const fn new(page: PhysicalPage<Size4K>) -> Self {
        Self(page)
    }

    #[inline]
    #[must_use]
    pub const fn page(&self) -> PhysicalPage<Size4K> {
        self.0
    }

    /// Give up ownership, e.g. to map or release the frame.
    #[inline]
    #[must_use]
    pub const fn into_inner(self) -> PhysicalPage<Size4K> {
        self.0
    }
}

/// FIFO of [`VmemmapPage`]s pending release or installation.
#[derive(Debug, Default)]
pub struct VmemmapPageList {
    pages: VecDeque<VmemmapPage>,
}

impl VmemmapPageList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: VecDeque::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn push_back(&mut self, page: VmemmapPage) {
        self.pages.push_back(page);
    }

    pub fn pop_front(&mut self) -> Option<VmemmapPage> {
        self.pages.pop_front()
    }

    /// The queued frames, front first.
    pub fn iter(&self) -> impl Iterator<Item = PhysicalPage<Size4K>> + '_ {
        self.pages.iter().map(VmemmapPage::page)
    }
}

impl IntoIterator for VmemmapPageList {
    type Item = VmemmapPage;
    type IntoIter = vec_deque::IntoIter<VmemmapPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

/// Maps every visited entry read-only onto the reuse page and queues the
/// frame it displaced.
struct RemapFree<'l> {
    displaced: &'l mut VmemmapPageList,
}

impl RemapPte for RemapFree<'_> {
    fn remap_pte(&mut self, pte: &mut PtEntry, addr: VirtualAddress, reuse: &ReusePage) {
        let page = pte.physical_page();
        assert_ne!(page, reuse.page, "{addr} already maps the reuse page");

        self.displaced.push_back(VmemmapPage::new(page));
        *pte = PtEntry::kernel_ro(reuse.page);
        trace!("vmemmap {addr}: {page} -> {} (ro)", reuse.page);
    }
}

/// Gives every visited entry its own copy of the reuse page.
struct RemapRestore<'a, M> {
    mapper: &'a M,
    pages: &'a mut VmemmapPageList,
}

impl<M: PhysMapper> RemapPte for RemapRestore<'_, M> {
    fn remap_pte(&mut self, pte: &mut PtEntry, addr: VirtualAddress, reuse: &ReusePage) {
        assert_eq!(
            pte.physical_page(),
            reuse.page,
            "{addr} does not map the reuse page"
        );
        let Some(page) = self.pages.pop_front() else {
            panic!("no preallocated vmemmap page left for {addr}");
        };

        let page = page.into_inner();
        self.mapper.copy_page(page, reuse.page);
        *pte = PtEntry::kernel(page);
        trace!("vmemmap {addr}: {} -> {page} (rw)", reuse.page);
    }
}

/// `start` must be exactly one page above `reuse` and no higher than `end`.
fn assert_remap_args(start: VirtualAddress, end: VirtualAddress, reuse: VirtualAddress) {
    assert!(start <= end, "remap range [{start}, {end}) is reversed");
    assert!(
        start.as_u64().wrapping_sub(reuse.as_u64()) == PAGE_SIZE,
        "reuse address {reuse} must immediately precede {start}"
    );
}

impl<M: PhysMapper> Vmemmap<'_, M> {
    /// Remap `[start, end)` read-only onto the frame mapped at `reuse` and
    /// return the displaced frames without releasing them.
    ///
    /// # Panics
    /// If `start - reuse != PAGE_SIZE`, or on any condition
    /// [`remap_range`](Self::remap_range) rejects.
    pub fn remap_free_deferred(
        &self,
        start: VirtualAddress,
        end: VirtualAddress,
        reuse: VirtualAddress,
    ) -> VmemmapPageList {
        assert_remap_args(start, end, reuse);

        let mut displaced = VmemmapPageList::new();
        self.remap_range(
            reuse,
            end,
            &mut RemapFree {
                displaced: &mut displaced,
            },
        );
        displaced
    }

    /// Remap `[start, end)` read-only onto the frame mapped at `reuse` and
    /// release every displaced frame to the allocator that owns it.
    ///
    /// # Panics
    /// If `start - reuse != PAGE_SIZE`, or on any condition
    /// [`remap_range`](Self::remap_range) rejects.
    pub fn remap_free<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        start: VirtualAddress,
        end: VirtualAddress,
        reuse: VirtualAddress,
    ) {
        let displaced = self.remap_free_deferred(start, end, reuse);
        let released = displaced.len();
        alloc.release_page_list(displaced);
        debug!("vmemmap remap free [{start}, {end}) onto {reuse}: {released} pages released");
    }

    /// Give every page in `[start, end)` its own read-write copy of the frame
    /// mapped at `reuse`.
    ///
    /// All frames are allocated before any entry changes. If one allocation
    /// fails, every frame obtained so far is freed and the tables are left
    /// untouched.
    ///
    /// # Errors
    /// [`VmemmapError::RemapOutOfMemory`] if the page allocator runs dry.
    ///
    /// # Panics
    /// If `start - reuse != PAGE_SIZE`, if an entry in the range does not map
    /// the reuse page, or on any condition [`remap_range`](Self::remap_range)
    /// rejects.
    pub fn remap_alloc<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        start: VirtualAddress,
        end: VirtualAddress,
        reuse: VirtualAddress,
        gfp: GfpFlags,
    ) -> Result<(), VmemmapError> {
        assert_remap_args(start, end, reuse);

        let mut pages = self.alloc_vmemmap_page_list(alloc.general_mut(), start, end, gfp)?;
        let restored = self.remap_range(
            reuse,
            end,
            &mut RemapRestore {
                mapper: self.mapper,
                pages: &mut pages,
            },
        );
        debug_assert!(pages.is_empty());

        debug!("vmemmap remap alloc [{start}, {end}) from {reuse}: {restored} pages restored");
        Ok(())
    }

    /// One order-0 frame per page in `[start, end)`, on the node owning the
    /// frames described at `start`.
    fn alloc_vmemmap_page_list<G: PageAllocator>(
        &self,
        general: &mut G,
        start: VirtualAddress,
        end: VirtualAddress,
        gfp: GfpFlags,
    ) -> Result<VmemmapPageList, VmemmapError> {
        let requested = (end - start) >> PAGE_SHIFT;
        let node = self.topology.pfn_to_nid(page_to_pfn(start));

        let mut pages = VmemmapPageList::new();
        for allocated in 0..requested {
            if let Some(page) = general.alloc_pages_node(node, gfp, 0) {
                pages.push_back(VmemmapPage::new(page));
                continue;
            }

            for page in pages {
                general.free_pages(page.into_inner(), 0);
            }
            return Err(VmemmapError::RemapOutOfMemory {
                requested,
                allocated,
            });
        }
        Ok(pages)
    }
}
