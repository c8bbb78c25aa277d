//! # Vmemmap Layout
//!
//! Every physical frame owns one `STRUCT_PAGE_SIZE`-byte metadata slot in
//! the vmemmap, so translating between a frame number and its metadata is
//! plain arithmetic:
//!
//! ```text
//! slot(pfn) = VMEMMAP_BASE + pfn * STRUCT_PAGE_SIZE
//! ```
//!
//! A memory section of `PAGES_PER_SECTION` frames therefore owns a
//! contiguous, page-aligned [`MemMap`] slice of the vmemmap.

use core::fmt;
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE, PAGES_PER_SECTION, STRUCT_PAGE_SIZE, VMEMMAP_BASE};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};

/// Address of the metadata slot describing `pfn`.
#[inline]
#[must_use]
pub const fn pfn_to_page(pfn: PageFrameNumber) -> VirtualAddress {
    VirtualAddress::new(VMEMMAP_BASE + pfn.as_u64() * STRUCT_PAGE_SIZE)
}

/// Frame described by the metadata slot at `page`.
///
/// `page` must lie inside the vmemmap.
#[inline]
#[must_use]
pub const fn page_to_pfn(page: VirtualAddress) -> PageFrameNumber {
    debug_assert!(page.as_u64() >= VMEMMAP_BASE);
    PageFrameNumber::new((page.as_u64() - VMEMMAP_BASE) / STRUCT_PAGE_SIZE)
}

/// Smallest order `n` such that `PAGE_SIZE << n >= size`.
#[inline]
#[must_use]
pub const fn get_order(size: u64) -> u32 {
    if size <= PAGE_SIZE {
        return 0;
    }
    u64::BITS - ((size - 1) >> PAGE_SHIFT).leading_zeros()
}

/// Number of a memory section.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SectionNr(u64);

impl SectionNr {
    #[inline]
    #[must_use]
    pub const fn new(nr: u64) -> Self {
        Self(nr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The first frame of this section.
    #[inline]
    #[must_use]
    pub const fn first_pfn(self) -> PageFrameNumber {
        PageFrameNumber::new(self.0 * PAGES_PER_SECTION)
    }

    /// The section containing `pfn`.
    #[inline]
    #[must_use]
    pub const fn of_pfn(pfn: PageFrameNumber) -> Self {
        Self(pfn.as_u64() / PAGES_PER_SECTION)
    }
}

impl fmt::Display for SectionNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section {}", self.0)
    }
}

/// The metadata array of a run of frames.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemMap {
    first_pfn: PageFrameNumber,
    nr_pages: u64,
}

impl MemMap {
    /// The metadata array covering all frames of `section`.
    #[inline]
    #[must_use]
    pub const fn for_section(section: SectionNr) -> Self {
        Self {
            first_pfn: section.first_pfn(),
            nr_pages: PAGES_PER_SECTION,
        }
    }

    /// First vmemmap address of the array.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        pfn_to_page(self.first_pfn)
    }

    /// One past the last vmemmap address of the array.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start().as_u64() + self.nr_pages * STRUCT_PAGE_SIZE)
    }

    #[inline]
    #[must_use]
    pub const fn first_pfn(&self) -> PageFrameNumber {
        self.first_pfn
    }

    /// Number of frames described.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.nr_pages
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nr_pages == 0
    }

    /// Metadata slot of `pfn`, or `None` if it is outside the array.
    #[must_use]
    pub fn slot(&self, pfn: PageFrameNumber) -> Option<VirtualAddress> {
        let offset = pfn.as_u64().checked_sub(self.first_pfn.as_u64())?;
        (offset < self.nr_pages).then_some(pfn_to_page(pfn))
    }
}
