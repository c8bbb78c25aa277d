//! # Memory Layout

/// log2 of the base page size.
pub const PAGE_SHIFT: u32 = 12;

/// Base page size in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Number of entries in every page-table level.
pub const ENTRIES_PER_TABLE: usize = 512;

/// End of userspace VA range after which Kernel space begins (5-level paging).
pub const LAST_USERSPACE_ADDRESS: u64 = 0xff00_0000_0000_0000;

/// Base of the virtual memory map.
///
/// The metadata slot of frame `pfn` lives at
/// `VMEMMAP_BASE + pfn * STRUCT_PAGE_SIZE`.
pub const VMEMMAP_BASE: u64 = 0xffd4_0000_0000_0000;

/// Size in bytes of one per-frame metadata descriptor.
pub const STRUCT_PAGE_SIZE: u64 = 64;

/// log2 of the section size in bytes (128 MiB sections).
pub const SECTION_SIZE_BITS: u32 = 27;

/// Number of base pages per memory section.
pub const PAGES_PER_SECTION: u64 = 1 << (SECTION_SIZE_BITS - PAGE_SHIFT);

/// Lowest physical address early-boot reservations aim for.
///
/// Everything below is left to legacy DMA users.
pub const MAX_DMA_PHYS_ADDRESS: u64 = 16 * 1024 * 1024;

/// Node distance reported for a node to itself; anything larger is remote.
pub const LOCAL_DISTANCE: u8 = 10;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

const _: () = {
    assert!(PAGE_SIZE == 4096);
    assert!(ENTRIES_PER_TABLE as u64 * 8 == PAGE_SIZE);
    assert!(STRUCT_PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE.is_multiple_of(STRUCT_PAGE_SIZE));
    assert!(SECTION_SIZE_BITS > PAGE_SHIFT);
    assert!((PAGES_PER_SECTION * STRUCT_PAGE_SIZE).is_multiple_of(PAGE_SIZE));
    assert!(VMEMMAP_BASE.is_multiple_of(PAGE_SIZE));
    assert!(VMEMMAP_BASE >= LAST_USERSPACE_ADDRESS);
    assert!(HHDM_BASE > VMEMMAP_BASE);
    assert!(MAX_DMA_PHYS_ADDRESS.is_multiple_of(PAGE_SIZE));
};
