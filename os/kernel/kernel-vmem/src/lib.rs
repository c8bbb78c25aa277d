//! # Virtual Memory Support
//!
//! x86-64 5-level paging model used to build and mutate kernel mappings.
//!
//! ## What you get
//! - Typed [`page_table`] levels (`PML5 → PML4 → PDPT → PD → PT`) with
//!   `bitfield-struct` entries and strongly typed indices.
//! - [`TableLevel`] with per-level span and range-splitting arithmetic.
//! - The [`PhysMapper`] trait to reach physical frames from code, and an
//!   [`HhdmPhysMapper`] for kernels with a direct map.
//! - The [`TlbFlush`] trait for range invalidation, and [`InvlpgTlbFlush`].
//!
//! ## x86-64 Virtual Address → Physical Address Walk (LA57)
//!
//! With 5-level paging each 57-bit virtual address is divided into six fields:
//!
//! ```text
//! | 56‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML5 |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  PML5  →  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │        │       │
//!   │        │        │        │       └───► PTE   → maps 4 KiB page
//!   │        │        │        └───────────► PDE   → PS=1 → 2 MiB page
//!   │        │        └────────────────────► PDPTE → PS=1 → 1 GiB page
//!   │        └─────────────────────────────► PML4E
//!   └──────────────────────────────────────► PML5E (root, referenced by CR3)
//! ```
//!
//! | Level | Linux name | Entry span |
//! |:--|:--|:--|
//! | PML5 | pgd | 256 TiB |
//! | PML4 | p4d | 512 GiB |
//! | PDPT | pud | 1 GiB |
//! | PD | pmd | 2 MiB |
//! | PT | pte | 4 KiB |
//!
//! ### Leaf vs. non-leaf entries
//!
//! - A **PTE** is always a leaf (maps 4 KiB).
//! - A **PDE** or **PDPTE** with `PS=1` is a leaf (2 MiB / 1 GiB).
//! - **PML5E** and **PML4E** always point to the next table.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod hhdm;
mod level;
pub mod page_table;
mod phys_mapper;
mod tlb;

pub use crate::hhdm::HhdmPhysMapper;
pub use crate::level::TableLevel;
pub use crate::page_table::pd::{L2Index, PageDirectory, PdEntry, PdEntryKind};
pub use crate::page_table::pdpt::{L3Index, PageDirectoryPointerTable, PdptEntry, PdptEntryKind};
pub use crate::page_table::pml4::{L4Index, Pml4Entry, Pml4Table};
pub use crate::page_table::pml5::{L5Index, Pml5Entry, Pml5Table};
pub use crate::page_table::pt::{L1Index, PageTable, PtEntry};
pub use crate::phys_mapper::{PageBytes, PhysMapper};
pub use crate::tlb::{InvlpgTlbFlush, TlbFlush};

/// Re-export constants as info module.
pub use kernel_info::memory as info;
