//! # Paging Levels
//!
//! [`TableLevel`] names the five levels of the hierarchy and carries the
//! per-level address arithmetic walkers need: how many bytes one entry spans
//! and where the entry covering an address ends.

use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// One level of the 5-level hierarchy, root first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    /// Root table; one entry spans 256 TiB.
    Pml5,
    /// One entry spans 512 GiB.
    Pml4,
    /// One entry spans 1 GiB.
    Pdpt,
    /// One entry spans 2 MiB.
    Pd,
    /// Leaf level; one entry maps one 4 KiB page.
    Pt,
}

impl TableLevel {
    /// Bit position of this level's index within a virtual address.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Pml5 => 48,
            Self::Pml4 => 39,
            Self::Pdpt => 30,
            Self::Pd => 21,
            Self::Pt => 12,
        }
    }

    /// Bytes of virtual address space covered by one entry at this level.
    #[inline]
    #[must_use]
    pub const fn span(self) -> u64 {
        1 << self.shift()
    }

    /// End of the entry covering `addr`, clamped to `end`.
    ///
    /// Returns the next `span()` boundary after `addr` if it lies before
    /// `end`, otherwise `end`. The boundary arithmetic wraps, so an entry
    /// at the very top of the address space yields `end`.
    #[inline]
    #[must_use]
    pub const fn addr_end(self, addr: VirtualAddress, end: VirtualAddress) -> VirtualAddress {
        let boundary = addr.as_u64().wrapping_add(self.span()) & !(self.span() - 1);
        if boundary.wrapping_sub(1) < end.as_u64().wrapping_sub(1) {
            VirtualAddress::new(boundary)
        } else {
            end
        }
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pml5 => "PML5",
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_end_stops_at_boundary() {
        let addr = VirtualAddress::new(0x1F_F000);
        let end = VirtualAddress::new(0x40_0000);
        assert_eq!(TableLevel::Pd.addr_end(addr, end).as_u64(), 0x20_0000);
    }

    #[test]
    fn addr_end_clamps_to_end() {
        let addr = VirtualAddress::new(0x20_0000);
        let end = VirtualAddress::new(0x20_3000);
        assert_eq!(TableLevel::Pd.addr_end(addr, end), end);
        assert_eq!(TableLevel::Pml5.addr_end(addr, end), end);
    }

    #[test]
    fn addr_end_wraps_at_top_of_address_space() {
        let addr = VirtualAddress::new(0xFFFF_0000_0000_0000);
        let end = VirtualAddress::new(0xFFFF_0000_0000_2000);
        assert_eq!(TableLevel::Pml5.addr_end(addr, end), end);
    }

    #[test]
    fn spans_and_order() {
        assert_eq!(TableLevel::Pt.span(), 4096);
        assert_eq!(TableLevel::Pd.span(), 2 * 1024 * 1024);
        assert_eq!(TableLevel::Pdpt.span(), 1024 * 1024 * 1024);
        assert!(TableLevel::Pml5 < TableLevel::Pt);
        assert_eq!(TableLevel::Pdpt.to_string(), "PDPT");
    }
}
