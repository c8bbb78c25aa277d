//! # x86-64 Page Directory Pointer Table (PDPT / L3)
//!
//! - [`L3Index`]: index type for virtual-address bits `[38:30]`.
//! - [`PdptEntry`]: either a pointer to a PD (`PS=0`) or a 1 GiB leaf (`PS=1`).
//! - [`PdptEntryKind`]: decoded view of a present entry.
//! - [`PageDirectoryPointerTable`]: a 4 KiB-aligned array of 512 entries.
//!
//! ## Semantics
//!
//! The vmemmap only ever installs the `PS=0` form. The leaf form is decoded
//! so that walkers can refuse ranges backed by giant mappings.

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size1G, Size4K};

table_index!(
    /// Index into the PDPT (VA bits `[38:30]`).
    L3Index,
    30
);

/// A PDPT entry (PDPTE).
#[doc(alias = "PUD")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PdptEntry {
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
    /// Dirty (bit 6): leaf form only.
    pub dirty: bool,
    /// Page Size (bit 7): `1` makes this a 1 GiB leaf.
    pub page_size: bool,
    /// Global (bit 8): leaf form only.
    pub global: bool,
    #[bits(3)]
    __os_available_low: u8,
    /// Physical address bits 12..51.
    ///
    /// In the leaf form bit 12 is PAT and the base is bits 30..51.
    #[bits(40)]
    phys_addr_51_12: u64,
    #[bits(11)]
    __ignored52_62: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

/// Decoded PDPTE kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PdptEntryKind {
    NextPageDirectory(PhysicalPage<Size4K>),
    Leaf1GiB(PhysicalPage<Size1G>),
}

impl PdptEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// A present kernel entry pointing at the Page Directory in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    /// A present, writable 1 GiB kernel leaf.
    #[inline]
    #[must_use]
    pub const fn leaf_1g(page: PhysicalPage<Size1G>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_page_size(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    /// `true` for a present 1 GiB leaf.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.present() && self.page_size()
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdptEntryKind> {
        if !self.present() {
            return None;
        }
        let pa = PhysicalAddress::new(self.phys_addr_51_12() << 12);
        Some(if self.page_size() {
            PdptEntryKind::Leaf1GiB(PhysicalPage::from_addr(pa))
        } else {
            PdptEntryKind::NextPageDirectory(PhysicalPage::from_addr(pa))
        })
    }

    /// The next-level Page Directory, or `None` if not present or a leaf.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        match self.kind() {
            Some(PdptEntryKind::NextPageDirectory(page)) => Some(page),
            _ => None,
        }
    }
}

page_table_struct!(
    /// The Page Directory Pointer Table (L3): 512 entries, 4 KiB-aligned.
    #[doc(alias = "PDPT")]
    PageDirectoryPointerTable,
    PdptEntry,
    L3Index
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdpt_table_vs_1g() {
        let pd = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x5000));
        let e = PdptEntry::table(pd);
        assert_eq!(e.kind(), Some(PdptEntryKind::NextPageDirectory(pd)));
        assert!(!e.is_leaf());
        assert_eq!(e.into_bits() & (1 << 7), 0, "must be PS=0");

        let g = PhysicalPage::<Size1G>::from_addr(PhysicalAddress::new(0x4000_0000));
        let e = PdptEntry::leaf_1g(g);
        assert_eq!(e.kind(), Some(PdptEntryKind::Leaf1GiB(g)));
        assert!(e.is_leaf());
        assert_eq!(e.next_table(), None);
    }
}
