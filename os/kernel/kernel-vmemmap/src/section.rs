//! # Section Map Populate

use crate::altmap::VmemAltmap;
use crate::block::BlockAllocator;
use crate::error::VmemmapError;
use crate::layout::{MemMap, SectionNr};
use crate::platform::{BootAllocator, NodeId, PageAllocator};
use crate::Vmemmap;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::PhysMapper;
use log::debug;

/// How a vmemmap range is backed.
///
/// The platform picks the strategy; [`BasePages`] maps the range with 4 KiB
/// pages and is the only one the remap engines work with.
pub trait PopulateStrategy {
    /// Back `[start, end)` with metadata pages on `node`.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if the range cannot be fully mapped.
    fn populate<M: PhysMapper, G: PageAllocator, B: BootAllocator>(
        &self,
        vmemmap: &Vmemmap<'_, M>,
        alloc: &mut BlockAllocator<G, B>,
        start: VirtualAddress,
        end: VirtualAddress,
        node: NodeId,
        altmap: Option<&mut VmemAltmap>,
    ) -> Result<(), VmemmapError>;
}

/// Map the range page by page with [`Vmemmap::populate_basepages`].
#[derive(Debug, Default, Copy, Clone)]
pub struct BasePages;

impl PopulateStrategy for BasePages {
    fn populate<M: PhysMapper, G: PageAllocator, B: BootAllocator>(
        &self,
        vmemmap: &Vmemmap<'_, M>,
        alloc: &mut BlockAllocator<G, B>,
        start: VirtualAddress,
        end: VirtualAddress,
        node: NodeId,
        altmap: Option<&mut VmemAltmap>,
    ) -> Result<(), VmemmapError> {
        let stats = vmemmap.populate_basepages(alloc, start, end, node, altmap)?;
        debug!(
            "vmemmap [{start}, {end}): {} mapped, {} present, {} off-node",
            stats.mapped, stats.present, stats.offnode
        );
        Ok(())
    }
}

impl<M: PhysMapper> Vmemmap<'_, M> {
    /// Materialize the metadata array of `section` on `node`.
    ///
    /// # Errors
    /// [`VmemmapError::OutOfMemory`] if any page of the array cannot be
    /// mapped; the pages mapped before the failure stay in place.
    pub fn populate_section<S, G, B>(
        &self,
        strategy: &S,
        alloc: &mut BlockAllocator<G, B>,
        section: SectionNr,
        node: NodeId,
        altmap: Option<&mut VmemAltmap>,
    ) -> Result<MemMap, VmemmapError>
    where
        S: PopulateStrategy,
        G: PageAllocator,
        B: BootAllocator,
    {
        let map = MemMap::for_section(section);
        strategy.populate(self, alloc, map.start(), map.end(), node, altmap)?;
        debug!("{section}: memmap at {} populated on {node}", map.start());
        Ok(map)
    }
}
