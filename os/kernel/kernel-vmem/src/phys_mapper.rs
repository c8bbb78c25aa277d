//! # Physical Memory Access
//!
//! Page tables and metadata pages are addressed by physical frame, but code can
//! only dereference virtual addresses. [`PhysMapper`] abstracts over how a
//! frame is made visible: the kernel's direct map ([`HhdmPhysMapper`](crate::HhdmPhysMapper)),
//! an identity map in the loader, or plain host buffers in tests.

use crate::page_table::pd::PageDirectory;
use crate::page_table::pdpt::PageDirectoryPointerTable;
use crate::page_table::pml4::Pml4Table;
use crate::page_table::pml5::Pml5Table;
use crate::page_table::pt::PageTable;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// A raw 4 KiB frame.
pub type PageBytes = [u8; PAGE_SIZE as usize];

/// Converts physical addresses to usable references.
///
/// The typed accessors have default implementations in terms of
/// [`phys_to_mut`](Self::phys_to_mut); implementors normally provide only that.
pub trait PhysMapper {
    /// Borrow the `T` stored at physical address `pa`.
    ///
    /// # Safety
    /// - `pa` must be mapped, writable and suitably aligned for `T`.
    /// - The caller must not create overlapping mutable borrows of the same memory.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// Borrow the PML5 root table in `page`.
    #[inline]
    fn pml5_mut(&self, page: PhysicalPage<Size4K>) -> &mut Pml5Table {
        unsafe { self.phys_to_mut::<Pml5Table>(page.base()) }
    }

    /// Borrow the PML4 table in `page`.
    #[inline]
    fn pml4_mut(&self, page: PhysicalPage<Size4K>) -> &mut Pml4Table {
        unsafe { self.phys_to_mut::<Pml4Table>(page.base()) }
    }

    /// Borrow the PDPT in `page`.
    #[inline]
    fn pdpt_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageDirectoryPointerTable {
        unsafe { self.phys_to_mut::<PageDirectoryPointerTable>(page.base()) }
    }

    /// Borrow the Page Directory in `page`.
    #[inline]
    fn pd_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageDirectory {
        unsafe { self.phys_to_mut::<PageDirectory>(page.base()) }
    }

    /// Borrow the Page Table in `page`.
    #[inline]
    fn pt_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageTable {
        unsafe { self.phys_to_mut::<PageTable>(page.base()) }
    }

    /// Borrow the raw bytes of `page`.
    #[inline]
    fn page_bytes_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageBytes {
        unsafe { self.phys_to_mut::<PageBytes>(page.base()) }
    }

    /// Zero `len` bytes starting at the page-aligned address `pa`.
    ///
    /// `len` is rounded up to whole pages.
    fn zero_range(&self, pa: PhysicalAddress, len: u64) {
        debug_assert!(pa.is_aligned_to(PAGE_SIZE));
        let mut offset = 0;
        while offset < len {
            self.page_bytes_mut((pa + offset).page()).fill(0);
            offset += PAGE_SIZE;
        }
    }

    /// Copy the full content of `src` into `dst`.
    fn copy_page(&self, dst: PhysicalPage<Size4K>, src: PhysicalPage<Size4K>) {
        if dst == src {
            return;
        }
        let from: &PageBytes = self.page_bytes_mut(src);
        self.page_bytes_mut(dst).copy_from_slice(from);
    }
}
