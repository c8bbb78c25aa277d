//! # Platform Collaborators
//!
//! The vmemmap core does not own physical memory. It borrows frames from the
//! general page allocator once that is up, from the early-boot reserve before,
//! and asks the platform which NUMA node a frame lives on.

use crate::gfp::GfpFlags;
use core::fmt;
use kernel_memory_addresses::{PageFrameNumber, PhysicalAddress, PhysicalPage, Size4K};

/// NUMA node identifier.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u16);

impl NodeId {
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// The general page allocator.
pub trait PageAllocator {
    /// Whether the allocator has been initialized and may be called.
    fn is_available(&self) -> bool;

    /// Allocate `1 << order` contiguous frames on `node`.
    fn alloc_pages_node(
        &mut self,
        node: NodeId,
        gfp: GfpFlags,
        order: u32,
    ) -> Option<PhysicalPage<Size4K>>;

    /// Return `1 << order` frames obtained from [`alloc_pages_node`](Self::alloc_pages_node).
    fn free_pages(&mut self, page: PhysicalPage<Size4K>, order: u32);
}

/// Upper bound for an early-boot reservation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootLimit {
    /// Anything currently mapped and accessible.
    Accessible,
    /// Strictly below the given address.
    Below(PhysicalAddress),
}

/// An early-boot reservation request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootRequest {
    pub size: u64,
    pub align: u64,
    /// Preferred lowest address; the allocator may go below it if needed.
    pub goal: PhysicalAddress,
    pub limit: BootLimit,
    pub node: NodeId,
}

/// The early-boot reserve allocator.
pub trait BootAllocator {
    /// Reserve `req.size` bytes, preferring `req.node`. The memory is not zeroed.
    fn alloc_try_nid_raw(&mut self, req: BootRequest) -> Option<PhysicalAddress>;

    /// Hand a reserved page back to the system.
    fn free_bootmem_page(&mut self, page: PhysicalPage<Size4K>);

    /// Whether `page` was obtained from this allocator and is still reserved.
    fn is_reserved(&self, page: PhysicalPage<Size4K>) -> bool;
}

/// NUMA topology queries.
pub trait NodeTopology {
    /// The node `pfn` belongs to.
    fn pfn_to_nid(&self, pfn: PageFrameNumber) -> NodeId;

    /// Relative access cost between two nodes; `LOCAL_DISTANCE` for a node to itself.
    fn node_distance(&self, from: NodeId, to: NodeId) -> u8;
}

/// A machine with a single node.
#[derive(Debug, Default, Copy, Clone)]
pub struct SingleNode;

impl NodeTopology for SingleNode {
    fn pfn_to_nid(&self, _pfn: PageFrameNumber) -> NodeId {
        NodeId::new(0)
    }

    fn node_distance(&self, _from: NodeId, _to: NodeId) -> u8 {
        kernel_info::memory::LOCAL_DISTANCE
    }
}
