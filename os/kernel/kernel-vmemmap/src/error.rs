use crate::platform::NodeId;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::TableLevel;

/// Device page map (altmap) allocation failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AltmapError {
    #[error("altmap allocations must be a non-zero multiple of the page size ({size} bytes)")]
    Misaligned { size: u64 },
    #[error("altmap exhausted: {requested} frames requested, {available} free")]
    Exhausted { requested: u64, available: u64 },
}

/// Block allocation failures, by the allocator that was asked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("page allocator failed (order {order}, {node})")]
    GeneralAllocator { order: u32, node: NodeId },
    #[error("boot reserve failed ({size} bytes, {node})")]
    BootReserve { size: u64, node: NodeId },
    #[error(transparent)]
    Altmap(#[from] AltmapError),
}

/// Errors surfaced by the populate and remap entry points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmemmapError {
    /// A table or leaf block could not be allocated while populating the
    /// `level` entry covering `addr`. Lower addresses stay mapped.
    #[error("out of memory populating {level} entry for {addr}")]
    OutOfMemory {
        level: TableLevel,
        addr: VirtualAddress,
        source: AllocError,
    },
    /// Pre-allocation for a remap failed; every page obtained was returned.
    #[error("out of memory restoring vmemmap: {allocated} of {requested} pages allocated")]
    RemapOutOfMemory { requested: u64, allocated: u64 },
}
