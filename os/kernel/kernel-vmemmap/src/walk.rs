//! # Remap Walker
//!
//! Depth-first traversal of an already populated vmemmap range, handing every
//! leaf entry except the first to a [`RemapPte`] visitor.
//!
//! The walked range is `[reuse, end)`. Its first page is the *reuse page*: the
//! walker records which frame backs it and never hands it to the visitor, so
//! its mapping is left untouched. After the walk a single TLB invalidation
//! covers `[reuse + PAGE_SIZE, end)`.
//!
//! The walker never allocates. Every level must already be present and no
//! level above the leaf may be a huge mapping; violations panic.

use crate::{Vmemmap, table_of};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{L1Index, L2Index, L3Index, L4Index, L5Index, PhysMapper, PtEntry, TableLevel};

/// The frame shared by a deduplicated range, and the address mapping it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReusePage {
    pub page: PhysicalPage<Size4K>,
    pub addr: VirtualAddress,
}

/// Per-leaf callback of [`Vmemmap::remap_range`].
pub trait RemapPte {
    /// Visit the present leaf entry mapping `addr`.
    fn remap_pte(&mut self, pte: &mut PtEntry, addr: VirtualAddress, reuse: &ReusePage);
}

struct Walk<'v, V: ?Sized> {
    visitor: &'v mut V,
    reuse: Option<ReusePage>,
    visited: u64,
}

impl<M: PhysMapper> Vmemmap<'_, M> {
    /// Walk `[start, end)`, treating `start` as the reuse page and passing
    /// every following leaf entry to `visitor` in increasing address order.
    ///
    /// Returns the number of entries visited.
    ///
    /// # Panics
    /// - If `start` or `end` is not page-aligned, or `start >= end`.
    /// - If a level is not populated, or a PDPT/PD entry is a huge mapping.
    pub fn remap_range<V: RemapPte + ?Sized>(
        &self,
        start: VirtualAddress,
        end: VirtualAddress,
        visitor: &mut V,
    ) -> u64 {
        assert!(
            start.is_aligned_to(PAGE_SIZE) && end.is_aligned_to(PAGE_SIZE),
            "remap range [{start}, {end}) is not page-aligned"
        );
        assert!(start < end, "empty remap range at {start}");

        let mut walk = Walk {
            visitor,
            reuse: None,
            visited: 0,
        };

        let pml5 = self.mapper.pml5_mut(self.root);
        let mut addr = start;
        loop {
            let next = TableLevel::Pml5.addr_end(addr, end);
            let entry = pml5.get(L5Index::from(addr));
            let pml4 = table_of(entry.next_table(), TableLevel::Pml5, addr);
            self.walk_pml4(pml4, addr, next, &mut walk);
            addr = next;
            if addr == end {
                break;
            }
        }

        self.tlb.flush_kernel_range(start + PAGE_SIZE, end);
        walk.visited
    }

    fn walk_pml4<V: RemapPte + ?Sized>(
        &self,
        table: PhysicalPage<Size4K>,
        mut addr: VirtualAddress,
        end: VirtualAddress,
        walk: &mut Walk<'_, V>,
    ) {
        let pml4 = self.mapper.pml4_mut(table);
        loop {
            let next = TableLevel::Pml4.addr_end(addr, end);
            let entry = pml4.get(L4Index::from(addr));
            let pdpt = table_of(entry.next_table(), TableLevel::Pml4, addr);
            self.walk_pdpt(pdpt, addr, next, walk);
            addr = next;
            if addr == end {
                break;
            }
        }
    }

    fn walk_pdpt<V: RemapPte + ?Sized>(
        &self,
        table: PhysicalPage<Size4K>,
        mut addr: VirtualAddress,
        end: VirtualAddress,
        walk: &mut Walk<'_, V>,
    ) {
        let pdpt = self.mapper.pdpt_mut(table);
        loop {
            let next = TableLevel::Pdpt.addr_end(addr, end);
            let entry = pdpt.get(L3Index::from(addr));
            assert!(!entry.is_leaf(), "huge PDPT mapping at {addr} in remap range");
            let pd = table_of(entry.next_table(), TableLevel::Pdpt, addr);
            self.walk_pd(pd, addr, next, walk);
            addr = next;
            if addr == end {
                break;
            }
        }
    }

    fn walk_pd<V: RemapPte + ?Sized>(
        &self,
        table: PhysicalPage<Size4K>,
        mut addr: VirtualAddress,
        end: VirtualAddress,
        walk: &mut Walk<'_, V>,
    ) {
        let pd = self.mapper.pd_mut(table);
        loop {
            let next = TableLevel::Pd.addr_end(addr, end);
            let entry = pd.get(L2Index::from(addr));
            assert!(!entry.is_leaf(), "huge PD mapping at {addr} in remap range");
            let pt = table_of(entry.next_table(), TableLevel::Pd, addr);
            self.walk_pt(pt, addr, next, walk);
            addr = next;
            if addr == end {
                break;
            }
        }
    }

    fn walk_pt<V: RemapPte + ?Sized>(
        &self,
        table: PhysicalPage<Size4K>,
        mut addr: VirtualAddress,
        end: VirtualAddress,
        walk: &mut Walk<'_, V>,
    ) {
        let pt = self.mapper.pt_mut(table);

        // The first leaf of the whole walk is the reuse page.
        let reuse = if let Some(reuse) = walk.reuse {
            reuse
        } else {
            let entry = pt.get(L1Index::from(addr));
            assert!(entry.present(), "reuse address {addr} is not mapped");
            let reuse = ReusePage {
                page: entry.physical_page(),
                addr,
            };
            walk.reuse = Some(reuse);
            addr += PAGE_SIZE;
            reuse
        };

        while addr != end {
            let pte = pt.entry_mut(L1Index::from(addr));
            assert!(pte.present(), "vmemmap address {addr} is not mapped");
            walk.visitor.remap_pte(pte, addr, &reuse);
            walk.visited += 1;
            addr += PAGE_SIZE;
        }
    }
}
