//! # x86-64 Page Map Level 5 (PML5 / L5)
//!
//! The root of the 5-level (LA57) hierarchy:
//!
//! - [`L5Index`]: index type for virtual-address bits `[56:48]`.
//! - [`Pml5Entry`]: a PML5 entry; always points to a PML4 (no leaf form).
//! - [`Pml5Table`]: a 4 KiB-aligned array of 512 entries.
//!
//! The kernel keeps exactly one root; callers hand its frame around explicitly.

use crate::page_table::PS_BIT;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

table_index!(
    /// Index into the PML5 table (VA bits `[56:48]`).
    L5Index,
    48
);

/// A PML5 entry. Non-leaf only: bit 7 must be zero.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Pml5Entry {
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
    #[bits(1)]
    __ignored6: u8,
    /// PS (bit 7): **must be 0**.
    #[bits(1)]
    __ps_must_be_0: u8,
    #[bits(4)]
    __ignored8_11: u8,
    /// PML4 physical address (bits 12..51).
    #[bits(40)]
    phys_addr_51_12: u64,
    #[bits(11)]
    __ignored52_62: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl Pml5Entry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// A present kernel entry pointing at the PML4 in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    /// `true` if all 64 bits are clear.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    /// The next-level PML4, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        if !self.present() {
            return None;
        }
        debug_assert!(self.into_bits() & PS_BIT == 0);
        Some(PhysicalPage::from_addr(PhysicalAddress::new(
            self.phys_addr_51_12() << 12,
        )))
    }
}

page_table_struct!(
    /// The PML5 root table: 512 entries, 4 KiB-aligned.
    #[doc(alias = "PGD")]
    Pml5Table,
    Pml5Entry,
    L5Index
);
