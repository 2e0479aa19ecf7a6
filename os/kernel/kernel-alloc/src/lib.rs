//! # Kernel Memory Allocation
//!
//! Physical frame allocation and dynamic kernel page mapping for the 32-bit
//! higher-half kernel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           Kernel Virtual Memory Manager             │
//! │    • reconciles page tables with the frame table    │
//! │    • maps / unmaps runs of kernel pages             │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Frame Allocator                  │
//! │    • one table entry per 4 KiB frame of usable RAM  │
//! │    • circular first-fit from a rotating cursor      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Usable regions ([`regions`])
//! Filters the boot memory map down to the RAM the allocator may use.
//!
//! ### Physical Frame Allocator ([`frame_alloc`])
//! [`PageFrameManager`] over caller-provided storage, behind the
//! [`FrameAlloc`] trait.
//!
//! ### Kernel Virtual Memory Manager ([`vmm`])
//! [`KernelVmm`] owns the kernel address space and the frame allocator.
//! After [`KernelVmm::synchronize`] every frame mapped by the kernel is
//! marked in use; afterwards [`KernelVmm::allocate_kernel_pages`] and
//! [`KernelVmm::free_kernel_pages`] keep both sides consistent.
//!
//! ## Errors
//!
//! Recoverable conditions are reported as [`MemoryError`]. Broken boot-time
//! invariants and misuse of the kernel page API panic.
//!
//! ## Concurrency
//!
//! Every mutating operation takes `&mut self`. There is no internal locking;
//! callers sharing the manager with interrupt handlers must provide their
//! own exclusion.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod error;
pub mod frame_alloc;
pub mod regions;
pub mod vmm;

pub use crate::error::MemoryError;
pub use crate::frame_alloc::{FrameAlloc, PageFrameManager};
pub use crate::regions::{MemoryRegion, MemoryRegions, usable_regions};
pub use crate::vmm::KernelVmm;
