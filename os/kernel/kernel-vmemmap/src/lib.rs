//! # Virtual Memory Map
//!
//! The vmemmap is a virtually contiguous array holding one metadata slot per
//! physical frame, so that `pfn → metadata` is a single multiply-add
//! (see [`pfn_to_page`]). Only the parts of the array that describe present
//! memory are backed by real pages; this crate builds and reshapes those
//! mappings.
//!
//! ## Components
//!
//! | Concern | Entry point |
//! |:--|:--|
//! | Block allocation | [`BlockAllocator`], [`VmemAltmap`], [`SparseBuffer`] |
//! | Table population | [`Vmemmap::pml5_populate`] … [`Vmemmap::pt_populate`] |
//! | Basepage populate | [`Vmemmap::populate_basepages`] |
//! | Section populate | [`Vmemmap::populate_section`] with a [`PopulateStrategy`] |
//! | Remap walk | [`Vmemmap::remap_range`] with a [`RemapPte`] visitor |
//! | Deduplication | [`Vmemmap::remap_free`] / [`Vmemmap::remap_alloc`] |
//!
//! ## Deduplication
//!
//! Memory backed by huge pages has metadata that is identical for every tail
//! frame. Such ranges can be folded onto one *reuse page*:
//!
//! ```text
//!            reuse   start                    end
//!              │       │                       │
//! before:    [ R ]   [ A ]   [ B ]   [ C ]
//! remap_free [ R ]   [R ro]  [R ro]  [R ro]      A, B, C released
//! remap_alloc[ R ]   [ A']   [ B']   [ C']      copies of R, read-write
//! ```
//!
//! ## Concurrency
//!
//! Nothing here locks. Callers serialize populate and remap calls for
//! overlapping ranges.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod altmap;
mod block;
mod error;
mod gfp;
mod layout;
mod platform;
mod populate;
mod remap;
mod section;
mod walk;

pub use crate::altmap::VmemAltmap;
pub use crate::block::{Block, BlockAllocator, BlockSource, SparseBuffer};
pub use crate::error::{AllocError, AltmapError, VmemmapError};
pub use crate::gfp::GfpFlags;
pub use crate::layout::{MemMap, SectionNr, get_order, page_to_pfn, pfn_to_page};
pub use crate::platform::{
    BootAllocator, BootLimit, BootRequest, NodeId, NodeTopology, PageAllocator, SingleNode,
};
pub use crate::populate::{OffNodePage, PopulateStats, PopulatedPte};
pub use crate::remap::{VmemmapPage, VmemmapPageList};
pub use crate::section::{BasePages, PopulateStrategy};
pub use crate::walk::{RemapPte, ReusePage};

use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{
    L1Index, L2Index, L3Index, L4Index, L5Index, PhysMapper, PtEntry, TableLevel, TlbFlush,
};

/// Handle to the kernel's vmemmap page tables.
///
/// The hierarchy is rooted at a single PML5 frame that lives for the
/// lifetime of the kernel. All mutation goes through this handle.
pub struct Vmemmap<'m, M: PhysMapper> {
    root: PhysicalPage<Size4K>,
    mapper: &'m M,
    tlb: &'m dyn TlbFlush,
    topology: &'m dyn NodeTopology,
}

impl<'m, M: PhysMapper> Vmemmap<'m, M> {
    #[must_use]
    pub const fn new(
        root: PhysicalPage<Size4K>,
        mapper: &'m M,
        tlb: &'m dyn TlbFlush,
        topology: &'m dyn NodeTopology,
    ) -> Self {
        Self {
            root,
            mapper,
            tlb,
            topology,
        }
    }

    /// The PML5 root frame.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage<Size4K> {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &'m M {
        self.mapper
    }

    /// The leaf entry currently mapping `addr`, without allocating.
    ///
    /// Returns `None` if any level above the leaf is missing or is a huge
    /// mapping.
    #[must_use]
    pub fn lookup(&self, addr: VirtualAddress) -> Option<PtEntry> {
        let m = self.mapper;
        let pml4 = m.pml5_mut(self.root).get(L5Index::from(addr)).next_table()?;
        let pdpt = m.pml4_mut(pml4).get(L4Index::from(addr)).next_table()?;
        let pd = m.pdpt_mut(pdpt).get(L3Index::from(addr)).next_table()?;
        let pt = m.pd_mut(pd).get(L2Index::from(addr)).next_table()?;
        Some(m.pt_mut(pt).get(L1Index::from(addr)))
    }
}

/// The table referenced by a present, non-leaf entry.
///
/// # Panics
/// If the entry is missing or maps a huge page.
#[inline]
fn table_of(
    next: Option<PhysicalPage<Size4K>>,
    level: TableLevel,
    addr: VirtualAddress,
) -> PhysicalPage<Size4K> {
    match next {
        Some(table) => table,
        None => panic!("{level} entry for {addr} does not reference a table"),
    }
}
