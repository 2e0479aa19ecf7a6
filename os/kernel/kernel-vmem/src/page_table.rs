//! # 32-bit Paging Structures
//!
//! Two-level translation without PAE:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDE  |  PTE  | Offset |
//! ```
//!
//! - [`PageDirectory`]: 1024 [`PageDirectoryEntry`] values, each pointing at a
//!   [`PageTable`] (or a 4 MiB page when `large_page` is set).
//! - [`PageTable`]: 1024 [`PageTableEntry`] values, each mapping one 4 KiB page.
//!
//! Both tables are exactly 4 KiB and 4 KiB-aligned, as the MMU requires.

mod pd;
mod pt;

pub use pd::{PageDirectory, PageDirectoryEntry};
pub use pt::{PageTable, PageTableEntry};
