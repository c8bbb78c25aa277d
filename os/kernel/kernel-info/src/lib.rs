//! # Kernel Memory Configuration
//!
//! Compile-time layout constants shared by the paging and vmemmap crates.
//! Every value lives in [`memory`] and is validated by `const` assertions, so
//! an inconsistent configuration fails the build rather than the boot.
//!
//! ## Virtual Memory Layout (LA57)
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │         User Space              │
//! LAST_USERSPACE_ADDRESS├─────────────────────────────────┤ 0xff00_0000_0000_0000
//!                       │        Guard Region             │
//! VMEMMAP_BASE          ├─────────────────────────────────┤ 0xffd4_0000_0000_0000
//!                       │  Page metadata array (vmemmap)  │
//!                       │  one STRUCT_PAGE_SIZE slot/pfn  │
//! HHDM_BASE             ├─────────────────────────────────┤ 0xffff_8880_0000_0000
//!                       │   Higher Half Direct Mapping    │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ## Sections
//!
//! Physical memory is managed in sections of `1 << SECTION_SIZE_BITS` bytes.
//! The metadata array of one section spans
//! `PAGES_PER_SECTION * STRUCT_PAGE_SIZE` bytes of vmemmap, which is always a
//! whole number of pages.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
