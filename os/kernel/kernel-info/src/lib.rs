//! # Kernel Configuration and Boot Interface
//!
//! Memory layout constants and the read-only record layouts the boot loader
//! hands to the kernel.
//!
//! ## Modules
//!
//! * [`memory`]: the higher-half layout (`KERNEL_BASE`, kernel page-table
//!   reach, frame-table capacity) and the kernel-image address conversions.
//! * [`boot`]: the Multiboot information record and its memory map.
//! * [`elf`]: ELF32 section headers and the section-name string table.
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   not present                   │
//!             │   (directory entries 0..768)    │
//! KERNEL_BASE ├─────────────────────────────────┤ 0xC000_0000
//!             │   low MiB of physical memory    │
//!             ├─────────────────────────────────┤ 0xC010_0000
//!             │   kernel image (ELF sections)   │
//!             ├─────────────────────────────────┤
//!             │   dynamically mapped pages      │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The kernel half is backed by 256 statically allocated page tables, so
//! every kernel mapping shares the same directory entries.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA, boot records)      │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (managed by the frame table)   │
//!             └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod elf;
pub mod memory;
