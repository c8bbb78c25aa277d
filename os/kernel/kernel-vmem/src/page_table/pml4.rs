//! # x86-64 Page Map Level 4 (PML4 / L4)
//!
//! - [`L4Index`]: index type for virtual-address bits `[47:39]`.
//! - [`Pml4Entry`]: points to a PDPT (no leaf form at this level).
//! - [`Pml4Table`]: a 4 KiB-aligned array of 512 entries.

use crate::page_table::PS_BIT;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

table_index!(
    /// Index into the PML4 table (VA bits `[47:39]`).
    L4Index,
    39
);

/// A PML4 entry (PML4E).
///
/// - Bit 7 (PS) is reserved and must be zero.
/// - Bits 12..51 hold the 4 KiB-aligned PDPT base.
#[doc(alias = "P4D")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Pml4Entry {
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
    #[bits(1)]
    __ps_must_be_0: u8,
    #[bits(4)]
    __ignored8_11: u8,
    #[bits(40)]
    phys_addr_51_12: u64,
    #[bits(11)]
    __ignored52_62: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl Pml4Entry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// A present kernel entry pointing at the PDPT in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    /// The next-level PDPT, or `None` if not present.
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
    /// The PML4 table: 512 entries, 4 KiB-aligned.
    #[doc(alias = "P4D")]
    Pml4Table,
    Pml4Entry,
    L4Index
);
