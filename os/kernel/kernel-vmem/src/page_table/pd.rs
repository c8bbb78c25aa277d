//! # x86-64 Page Directory (PD / L2)
//!
//! - [`L2Index`]: index type for virtual-address bits `[29:21]`.
//! - [`PdEntry`]: either a pointer to a PT (`PS=0`) or a 2 MiB leaf (`PS=1`).
//! - [`PdEntryKind`]: decoded view of a present entry.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 512 PD entries.
//!
//! ## Semantics
//!
//! At L2, the `PS` bit selects the role of an entry:
//! - `PS=0`: entry points to a next-level Page Table (PT), whose base is 4 KiB-aligned.
//! - `PS=1`: entry is a 2 MiB leaf mapping; base must be 2 MiB-aligned.
//!
//! A vmemmap range that is remapped page by page must not contain 2 MiB leaves;
//! [`PdEntry::is_leaf`] lets the walker enforce that.

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size2M, Size4K};

table_index!(
    /// Index into the Page Directory (derived from VA bits `[29:21]`).
    L2Index,
    21
);

/// A Page Directory entry (PDE).
#[doc(alias = "PMD")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PdEntry {
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
    /// **Dirty** (bit 6): leaf form only.
    pub dirty: bool,
    /// **Page Size** (bit 7): `1` makes this a 2 MiB leaf.
    pub page_size: bool,
    /// **Global** (bit 8): leaf form only.
    pub global: bool,
    #[bits(3)]
    __os_available_low: u8,
    /// Physical address bits 12..51 (PAT lives at bit 12 in the leaf form).
    #[bits(40)]
    phys_addr_51_12: u64,
    #[bits(11)]
    __ignored52_62: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

/// Decoded PDE kind.
///
/// - [`NextPageTable`](PdEntryKind::NextPageTable): non-leaf (`PS=0`), contains the 4 KiB-aligned PT base.
/// - [`Leaf2MiB`](PdEntryKind::Leaf2MiB): leaf (`PS=1`), contains the 2 MiB-aligned large-page base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PdEntryKind {
    NextPageTable(PhysicalPage<Size4K>),
    Leaf2MiB(PhysicalPage<Size2M>),
}

impl PdEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// A present kernel entry pointing at the Page Table in `page` (`PS=0`).
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    /// A present, writable 2 MiB kernel leaf (`PS=1`).
    #[inline]
    #[must_use]
    pub const fn leaf_2m(page: PhysicalPage<Size2M>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_page_size(true)
            .with_phys_addr_51_12(page.base().as_u64() >> 12)
    }

    /// `true` if all 64 bits are clear.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    /// `true` for a present 2 MiB leaf.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.present() && self.page_size()
    }

    /// Decode the entry into its semantic kind, or `None` if not present.
    ///
    /// - When `PS=1`, returns [`PdEntryKind::Leaf2MiB`] with a 2 MiB page base.
    /// - When `PS=0`, returns [`PdEntryKind::NextPageTable`] with a PT base.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdEntryKind> {
        if !self.present() {
            return None;
        }
        let pa = PhysicalAddress::new(self.phys_addr_51_12() << 12);
        Some(if self.page_size() {
            PdEntryKind::Leaf2MiB(PhysicalPage::from_addr(pa))
        } else {
            PdEntryKind::NextPageTable(PhysicalPage::from_addr(pa))
        })
    }

    /// The next-level Page Table, or `None` if not present or a leaf.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        match self.kind() {
            Some(PdEntryKind::NextPageTable(page)) => Some(page),
            _ => None,
        }
    }
}

page_table_struct!(
    /// The Page Directory (L2): 512 entries, 4 KiB-aligned.
    #[doc(alias = "PD")]
    PageDirectory,
    PdEntry,
    L2Index
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pd_table_vs_2m() {
        let pt = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x3000_0000));
        match PdEntry::table(pt).kind().unwrap() {
            PdEntryKind::NextPageTable(p) => assert_eq!(p.base().as_u64(), 0x3000_0000),
            PdEntryKind::Leaf2MiB(_) => panic!("expected next PT"),
        }

        let m2 = PhysicalPage::<Size2M>::from_addr(PhysicalAddress::new(0x4000_0000));
        let e_2m = PdEntry::leaf_2m(m2);
        match e_2m.kind().unwrap() {
            PdEntryKind::Leaf2MiB(p) => {
                assert_eq!(p.base().as_u64(), 0x4000_0000);
                assert_ne!(e_2m.into_bits() & (1 << 7), 0, "must be PS=1");
            }
            PdEntryKind::NextPageTable(_) => panic!("expected 2MiB leaf"),
        }
        assert!(e_2m.is_leaf());
    }

    #[test]
    fn index_of_extracts_bits_29_21() {
        let va = kernel_memory_addresses::VirtualAddress::new(0x0000_0000_0060_0000);
        assert_eq!(PageDirectory::index_of(va).as_usize(), 3);
    }
}
