//! # Populating the vmemmap
//!
//! One populator per level. Each looks at the entry covering `addr` and, if
//! it is empty, allocates what it must point to:
//!
//! | Populator | Entry | Allocates |
//! |:--|:--|:--|
//! | [`pml5_populate`](Vmemmap::pml5_populate) | PML5E | zeroed PML4 |
//! | [`pml4_populate`](Vmemmap::pml4_populate) | PML4E | zeroed PDPT |
//! | [`pdpt_populate`](Vmemmap::pdpt_populate) | PDPTE | zeroed PD |
//! | [`pd_populate`](Vmemmap::pd_populate) | PDE | zeroed PT |
//! | [`pt_populate`](Vmemmap::pt_populate) | PTE | metadata page (not zeroed) |
//!
//! Entries that are already present are returned unchanged, which makes
//! [`populate_basepages`](Vmemmap::populate_basepages) safe to repeat after a
//! partial failure. Nothing is rolled back on failure.

use crate::altmap::VmemAltmap;
use crate::block::{Block, BlockAllocator};
use crate::error::{AllocError, VmemmapError};
use crate::platform::{BootAllocator, NodeId, PageAllocator};
use crate::{Vmemmap, table_of};
use kernel_info::memory::{LOCAL_DISTANCE, PAGE_SIZE};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};
use kernel_vmem::{
    L1Index, L2Index, L3Index, L4Index, L5Index, PdEntry, PdptEntry, PhysMapper, Pml4Entry,
    Pml5Entry, PtEntry, TableLevel,
};
use log::warn;

/// Leaf entry returned by [`Vmemmap::pt_populate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PopulatedPte {
    pub entry: PtEntry,
    /// `false` if the entry was already present.
    pub created: bool,
}

/// A leaf page whose backing frame is far from the requested node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OffNodePage {
    pub start: VirtualAddress,
    pub end: VirtualAddress,
    pub pfn: PageFrameNumber,
    pub requested: NodeId,
    pub actual: NodeId,
}

/// Outcome of [`Vmemmap::populate_basepages`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PopulateStats {
    /// Leaf pages newly mapped by this call.
    pub mapped: u64,
    /// Leaf pages that were already mapped.
    pub present: u64,
    /// Leaf pages (new or old) backed by a remote node.
    pub offnode: u64,
}

impl PopulateStats {
    /// Pages covered by the call.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.mapped + self.present
    }
}

impl<M: PhysMapper> Vmemmap<'_, M> {
    /// Allocate a zero-filled block of `size` bytes for a page table.
    ///
    /// # Errors
    /// Whatever [`BlockAllocator::alloc_block`] reports.
    pub fn alloc_block_zero<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        size: u64,
        node: NodeId,
    ) -> Result<Block, AllocError> {
        let block = alloc.alloc_block(size, node)?;
        self.mapper.zero_range(block.base(), size);
        Ok(block)
    }

    fn alloc_table<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        level: TableLevel,
        addr: VirtualAddress,
        node: NodeId,
    ) -> Result<Block, VmemmapError> {
        self.alloc_block_zero(alloc, PAGE_SIZE, node)
            .map_err(|source| VmemmapError::OutOfMemory {
                level,
                addr,
                source,
            })
    }

    /// Ensure the root entry covering `addr` points to a PML4.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if the PML4 cannot be allocated.
    pub fn pml5_populate<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        addr: VirtualAddress,
        node: NodeId,
    ) -> Result<Pml5Entry, VmemmapError> {
        let entry = self.mapper.pml5_mut(self.root).entry_mut(L5Index::from(addr));
        if entry.is_none() {
            let block = self.alloc_table(alloc, TableLevel::Pml5, addr, node)?;
            *entry = Pml5Entry::table(block.page());
        }
        Ok(*entry)
    }

    /// Ensure the PML4 entry covering `addr` points to a PDPT.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if the PDPT cannot be allocated.
    pub fn pml4_populate<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        pml5e: Pml5Entry,
        addr: VirtualAddress,
        node: NodeId,
    ) -> Result<Pml4Entry, VmemmapError> {
        let table = table_of(pml5e.next_table(), TableLevel::Pml5, addr);
        let entry = self.mapper.pml4_mut(table).entry_mut(L4Index::from(addr));
        if entry.is_none() {
            let block = self.alloc_table(alloc, TableLevel::Pml4, addr, node)?;
            *entry = Pml4Entry::table(block.page());
        }
        Ok(*entry)
    }

    /// Ensure the PDPT entry covering `addr` points to a Page Directory.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if the PD cannot be allocated.
    pub fn pdpt_populate<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        pml4e: Pml4Entry,
        addr: VirtualAddress,
        node: NodeId,
    ) -> Result<PdptEntry, VmemmapError> {
        let table = table_of(pml4e.next_table(), TableLevel::Pml4, addr);
        let entry = self.mapper.pdpt_mut(table).entry_mut(L3Index::from(addr));
        if entry.is_none() {
            let block = self.alloc_table(alloc, TableLevel::Pdpt, addr, node)?;
            *entry = PdptEntry::table(block.page());
        }
        Ok(*entry)
    }

    /// Ensure the PD entry covering `addr` points to a Page Table.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if the PT cannot be allocated.
    ///
    /// # Panics
    /// If `pdpte` is a 1 GiB leaf.
    pub fn pd_populate<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        pdpte: PdptEntry,
        addr: VirtualAddress,
        node: NodeId,
    ) -> Result<PdEntry, VmemmapError> {
        let table = table_of(pdpte.next_table(), TableLevel::Pdpt, addr);
        let entry = self.mapper.pd_mut(table).entry_mut(L2Index::from(addr));
        if entry.is_none() {
            let block = self.alloc_table(alloc, TableLevel::Pd, addr, node)?;
            *entry = PdEntry::table(block.page());
        }
        Ok(*entry)
    }

    /// Ensure `addr` is mapped read-write to a metadata page.
    ///
    /// The page comes from `altmap` when one is given, otherwise from
    /// [`BlockAllocator::alloc_block_buf`]. Its content is left as allocated.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if no page can be allocated.
    ///
    /// # Panics
    /// If `pde` is a 2 MiB leaf.
    pub fn pt_populate<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        pde: PdEntry,
        addr: VirtualAddress,
        node: NodeId,
        altmap: Option<&mut VmemAltmap>,
    ) -> Result<PopulatedPte, VmemmapError> {
        let table = table_of(pde.next_table(), TableLevel::Pd, addr);
        let entry = self.mapper.pt_mut(table).entry_mut(L1Index::from(addr));
        if !entry.is_none() {
            return Ok(PopulatedPte {
                entry: *entry,
                created: false,
            });
        }

        let block = alloc
            .alloc_block_buf(PAGE_SIZE, node, altmap)
            .map_err(|source| VmemmapError::OutOfMemory {
                level: TableLevel::Pt,
                addr,
                source,
            })?;
        *entry = PtEntry::kernel(block.page());
        Ok(PopulatedPte {
            entry: *entry,
            created: true,
        })
    }

    /// Check that the frame behind `pte` is local to `node`.
    ///
    /// A remote frame is logged and reported, never treated as an error.
    pub fn verify(
        &self,
        pte: PtEntry,
        node: NodeId,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Option<OffNodePage> {
        let pfn = pte.physical_page().pfn();
        let actual = self.topology.pfn_to_nid(pfn);
        if self.topology.node_distance(actual, node) <= LOCAL_DISTANCE {
            return None;
        }

        warn!(
            "[{:x}-{:x}] potential offnode page_structs",
            start,
            end - 1
        );
        Some(OffNodePage {
            start,
            end,
            pfn,
            requested: node,
            actual,
        })
    }

    /// Map every page of `[start, end)` with base pages on `node`.
    ///
    /// Stops at the first allocation failure; pages below the failing
    /// address stay mapped.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] naming the level and address that failed.
    pub fn populate_basepages<G: PageAllocator, B: BootAllocator>(
        &self,
        alloc: &mut BlockAllocator<G, B>,
        start: VirtualAddress,
        end: VirtualAddress,
        node: NodeId,
        mut altmap: Option<&mut VmemAltmap>,
    ) -> Result<PopulateStats, VmemmapError> {
        debug_assert!(start.is_aligned_to(PAGE_SIZE) && end.is_aligned_to(PAGE_SIZE));

        let mut stats = PopulateStats::default();
        let mut addr = start;
        while addr < end {
            let pml5e = self.pml5_populate(alloc, addr, node)?;
            let pml4e = self.pml4_populate(alloc, pml5e, addr, node)?;
            let pdpte = self.pdpt_populate(alloc, pml4e, addr, node)?;
            let pde = self.pd_populate(alloc, pdpte, addr, node)?;
            let pte = self.pt_populate(alloc, pde, addr, node, altmap.as_deref_mut())?;

            if pte.created {
                stats.mapped += 1;
            } else {
                stats.present += 1;
            }
            if self.verify(pte.entry, node, addr, addr + PAGE_SIZE).is_some() {
                stats.offnode += 1;
            }
            addr += PAGE_SIZE;
        }
        Ok(stats)
    }
}
