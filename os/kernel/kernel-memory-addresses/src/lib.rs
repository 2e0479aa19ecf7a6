//! # Virtual and Physical Memory Address Types (32-bit x86)
//!
//! Strongly typed wrappers for the raw 32-bit addresses used by the paging and
//! frame allocation code.
//!
//! ## Overview
//!
//! Without PAE, both address kinds on 32-bit x86 are plain `u32` values. Keeping
//! them in distinct newtypes prevents handing a virtual address to code that
//! writes page-table entries (which want physical frames), and vice versa.
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] | Refers to virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] | Refers to physical RAM or MMIO. |
//!
//! ## Page Sizes
//!
//! Two page sizes exist in 32-bit non-PAE paging, both modelled as marker types
//! implementing [`PageSize`]:
//!
//! - [`Size4K`]: 4 KiB pages, mapped through a page table
//! - [`Size4M`]: 4 MiB pages, mapped directly by a page-directory entry (PSE)
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2345);
//! assert!(!pa.is_aligned::<Size4K>());
//! assert_eq!(pa.align_down::<Size4K>().as_u32(), 0x0010_2000);
//! assert_eq!(pa.offset::<Size4K>(), 0x345);
//!
//! let va = VirtualAddress::new(0xC010_2345);
//! assert_eq!(va.directory_index(), 768);
//! assert_eq!(va.table_index(), 0x102);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod virtual_address;

pub use crate::page_size::{PageSize, Size4K, Size4M};
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;
