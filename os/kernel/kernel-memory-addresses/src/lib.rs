//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses, page bases and frame
//! numbers used by the paging and vmemmap code.
//!
//! | Type | Description |
//! |----------|-------------|
//! | [`VirtualAddress`] | Virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Physical memory or device frames. |
//! | [`PageFrameNumber`] | Index of a 4 KiB physical frame (`pa >> 12`). |
//!
//! ## Page Sizes
//!
//! Marker types implementing [`PageSize`]:
//!
//! - [`Size4K`]: 4 KiB pages (base granularity)
//! - [`Size2M`]: 2 MiB huge pages
//! - [`Size1G`]: 1 GiB giant pages
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
//! assert_eq!(page.pfn(), PageFrameNumber::new(0x0102_0000));
//! assert_eq!(page.pfn().page().base(), page.base());
//! ```
//!
//! The types are `#[repr(transparent)]` over `u64` and all alignment math is
//! `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_frame_number;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;

pub use crate::page_frame_number::PageFrameNumber;
pub use crate::page_size::{PageSize, Size1G, Size2M, Size4K};
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;

/// Align `x` down to a multiple of `a` (power of two).
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    x & !(a - 1)
}

/// Align `x` up to a multiple of `a` (power of two).
///
/// `x + a - 1` must not overflow.
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    (x + a - 1) & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_helpers() {
        assert_eq!(align_down(0x12345, 4096), 0x12000);
        assert_eq!(align_up(0x12345, 4096), 0x13000);
        assert_eq!(align_up(0x13000, 4096), 0x13000);
        assert_eq!(align_down(0, 16), 0);
    }

    #[test]
    fn virtual_vs_physical_wrappers() {
        let va = VirtualAddress::new(0xFFFF_FFFF_8000_1234);
        assert_eq!(va.offset::<Size4K>(), 0x234);

        let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
        let pp = pa.page::<Size2M>();
        assert_eq!(pp.base().as_u64() & (Size2M::SIZE - 1), 0);
        assert_eq!(pa.offset::<Size2M>(), 0x42);
    }

    #[test]
    fn pfn_roundtrip() {
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x7654_3000));
        assert_eq!(page.pfn().as_u64(), 0x76543);
        assert_eq!(PhysicalPage::from_pfn(page.pfn()), page);
    }
}
