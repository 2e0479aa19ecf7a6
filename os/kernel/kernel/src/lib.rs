//! # Kernel Memory Subsystem
//!
//! Brings up paging and physical memory management for the 32-bit
//! higher-half kernel, in this order:
//!
//! 1. build the kernel address space from the kernel's ELF sections and load
//!    it into CR3,
//! 2. initialize the page frame manager from the boot memory map,
//! 3. reserve every frame the kernel page tables already map.
//!
//! The result is a [`KernelMemory`] owned by the caller; kernel pages are
//! then handed out through [`KernelVmm::allocate_kernel_pages`](kernel_alloc::KernelVmm::allocate_kernel_pages).
//!
//! ## Features
//!
//! * `qemu` (default): install the QEMU debug console logger during
//!   [`init_kernel_memory`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod mm;
mod tracing;

pub use crate::mm::{KernelMemory, bootstrap, init_kernel_memory};

use log::LevelFilter;

/// Log level installed together with the QEMU logger.
pub const KERNEL_LOG_LEVEL: LevelFilter = if cfg!(debug_assertions) {
    LevelFilter::Debug
} else {
    LevelFilter::Info
};
