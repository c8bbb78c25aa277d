//! # x86-64 Page Table (PT / L1)
//!
//! This module models the lowest paging level (L1, Page Table).
//!
//! - [`L1Index`]: index type for VA bits `[20:12]`.
//! - [`PtEntry`]: a PT entry (PTE). Entries represent 4 KiB leaf mappings only.
//! - [`PageTable`]: a 4 KiB-aligned array of 512 PTEs.
//!
//! ## Kernel mappings
//!
//! Metadata pages are mapped with [`PtEntry::kernel`] (read-write) and, once
//! deduplicated, with [`PtEntry::kernel_ro`] (read-only). Both are global and
//! non-executable; only the `writable` bit differs.
//!
//! After modifying active mappings, the caller must perform any required TLB maintenance.

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

table_index!(
    /// Index into the Page Table (derived from VA bits `[20:12]`).
    ///
    /// Strongly typed to avoid mixing with other levels.
    L1Index,
    12
);

/// A single Page Table entry (PTE).
///
/// A present PTE maps exactly one 4 KiB page. Bit 7 is PAT here, not PS.
#[doc(alias = "PTE")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PtEntry {
    /// Present (bit 0).
    pub present: bool,
    /// Writable (bit 1).
    pub writable: bool,
    /// User (bit 2).
    pub user: bool,
    /// Write-Through (bit 3).
    pub write_through: bool,
    /// Cache Disable (bit 4).
    pub cache_disable: bool,
    /// Accessed (bit 5).
    pub accessed: bool,
    /// Dirty (bit 6).
    pub dirty: bool,
    /// PAT selector (bit 7).
    pub pat: bool,
    /// Global (bit 8): TLB entry survives CR3 reload.
    pub global: bool,
    /// OS-available low (bits 9..11).
    #[bits(3)]
    pub os_available_low: u8,
    #[bits(40)]
    phys_addr_51_12: u64,
    /// OS-available high (bits 52..58).
    #[bits(7)]
    pub os_available_high: u8,
    /// Protection Key (bits 59..62).
    #[bits(4)]
    pub protection_key: u8,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl PtEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// Read-write kernel data mapping of `page` (`PAGE_KERNEL`).
    #[inline]
    #[must_use]
    pub const fn kernel(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_dirty(true)
            .with_global(true)
            .with_no_execute(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    /// Read-only kernel data mapping of `page` (`PAGE_KERNEL_RO`).
    #[inline]
    #[must_use]
    pub const fn kernel_ro(page: PhysicalPage<Size4K>) -> Self {
        Self::kernel(page).with_writable(false)
    }

    /// `true` if all 64 bits are clear.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    /// The mapped frame, whether or not the entry is present.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }

    /// The mapped frame, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn page(self) -> Option<PhysicalPage<Size4K>> {
        if self.present() {
            Some(self.physical_page())
        } else {
            None
        }
    }
}

page_table_struct!(
    /// The Page Table (L1): 512 entries, 4 KiB-aligned.
    #[doc(alias = "PT")]
    PageTable,
    PtEntry,
    L1Index
);
