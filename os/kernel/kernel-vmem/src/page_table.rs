//! # Memory Page Table
//!
//! One module per paging level, root first:
//!
//! | Module | Table | Entry | VA bits |
//! |:--|:--|:--|:--|
//! | [`pml5`] | [`Pml5Table`](pml5::Pml5Table) | [`Pml5Entry`](pml5::Pml5Entry) | `[56:48]` |
//! | [`pml4`] | [`Pml4Table`](pml4::Pml4Table) | [`Pml4Entry`](pml4::Pml4Entry) | `[47:39]` |
//! | [`pdpt`] | [`PageDirectoryPointerTable`](pdpt::PageDirectoryPointerTable) | [`PdptEntry`](pdpt::PdptEntry) | `[38:30]` |
//! | [`pd`] | [`PageDirectory`](pd::PageDirectory) | [`PdEntry`](pd::PdEntry) | `[29:21]` |
//! | [`pt`] | [`PageTable`](pt::PageTable) | [`PtEntry`](pt::PtEntry) | `[20:12]` |

use crate::page_table::pd::L2Index;
use crate::page_table::pdpt::L3Index;
use crate::page_table::pml4::L4Index;
use crate::page_table::pml5::L5Index;
use crate::page_table::pt::L1Index;
use kernel_memory_addresses::VirtualAddress;

/// Hardware **Page Size** (PS) bit position shared across levels (bit 7).
///
/// - In non-leaf entries: PS **must be 0**.
/// - In large leaf entries (L3 1 GiB / L2 2 MiB): PS **must be 1**.
/// - In L1 4 KiB PTEs: bit 7 is **PAT** (not PS).
const PS_BIT: u64 = 1 << 7;

/// Generates a strongly-typed table index for the VA bits starting at `$shift`.
macro_rules! table_index {
    ($(#[$meta:meta])* $name:ident, $shift:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u16);

        impl $name {
            /// Build an index from a virtual address (extracts the 9 index bits).
            #[inline]
            #[must_use]
            #[allow(clippy::cast_possible_truncation)]
            pub const fn from(va: kernel_memory_addresses::VirtualAddress) -> Self {
                Self::new(((va.as_u64() >> $shift) & 0x1FF) as u16)
            }

            /// Construct from a raw `u16`.
            ///
            /// ### Debug assertions
            /// - Asserts `v < ENTRIES_PER_TABLE` in debug builds.
            #[inline]
            #[must_use]
            pub const fn new(v: u16) -> Self {
                debug_assert!((v as usize) < $crate::info::ENTRIES_PER_TABLE);
                Self(v)
            }

            /// Return the index as `usize` for table access.
            #[inline]
            #[must_use]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }
    };
}

/// Generates a 4 KiB-aligned table of `ENTRIES_PER_TABLE` `$entry`s
/// addressed by `$index`.
macro_rules! page_table_struct {
    ($(#[$meta:meta])* $name:ident, $entry:ty, $index:ty) => {
        $(#[$meta])*
        #[repr(C, align(4096))]
        pub struct $name {
            entries: [$entry; $crate::info::ENTRIES_PER_TABLE],
        }

        impl $name {
            /// Create a fully zeroed table (all entries non-present).
            #[inline]
            #[must_use]
            pub const fn zeroed() -> Self {
                Self {
                    entries: [<$entry>::zero(); $crate::info::ENTRIES_PER_TABLE],
                }
            }

            /// Read the entry at `i`.
            ///
            /// Plain load; does not imply any TLB synchronization.
            #[inline]
            #[must_use]
            pub const fn get(&self, i: $index) -> $entry {
                self.entries[i.as_usize()]
            }

            /// Borrow the entry at `i` for in-place update.
            #[inline]
            pub const fn entry_mut(&mut self, i: $index) -> &mut $entry {
                &mut self.entries[i.as_usize()]
            }

            /// Write the entry at `i`.
            ///
            /// Caller must handle any required TLB invalidation when changing active mappings.
            #[inline]
            pub const fn set(&mut self, i: $index, e: $entry) {
                self.entries[i.as_usize()] = e;
            }

            /// Derive the index for this level from a virtual address.
            #[inline]
            #[must_use]
            pub const fn index_of(va: kernel_memory_addresses::VirtualAddress) -> $index {
                <$index>::from(va)
            }
        }
    };
}

// Declared after the macros so the level modules see them.
pub mod pd;
pub mod pdpt;
pub mod pml4;
pub mod pml5;
pub mod pt;

/// Split a virtual address into its five table indices, root first.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (L5Index, L4Index, L3Index, L2Index, L1Index) {
    (
        L5Index::from(va),
        L4Index::from(va),
        L3Index::from(va),
        L2Index::from(va),
        L1Index::from(va),
    )
}
