//! # Virtual Memory Support (32-bit x86)
//!
//! Paging records and the kernel address space for a higher-half kernel on
//! 32-bit x86 with 4 KiB pages and no PAE.
//!
//! ## What you get
//! - A generic [`PointerTableEntry`] word (20-bit frame + 12 status bits) and
//!   the typed entries built on it: [`PageDirectoryEntry`], [`PageTableEntry`]
//!   and [`FrameTableEntry`].
//! - 4 KiB-aligned [`PageDirectory`] and [`PageTable`] wrappers.
//! - The [`KernelAddressSpace`]: one directory plus the 256 page tables that
//!   back the kernel half, and the boot-time builder that fills them.
//! - A [`PhysMapper`] to convert between kernel pointers and physical
//!   addresses, and [`invalidate_tlb_page`].
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//!  CR3 → Page Directory ──PDE──► Page Table ──PTE──► 4 KiB frame
//!         (bits 31‒22)            (bits 21‒12)        + offset (bits 11‒0)
//! ```
//!
//! | Level | Table name | Entry name | Description |
//! |:------|:-----------|:-----------|:------------|
//! | 1 | **PD** (Page Directory) | **PDE** | Each entry points to a page table, or maps a 4 MiB page if `PS=1`. Referenced by [`CR3`](https://wiki.osdev.org/CPU_Registers_x86#CR3). |
//! | 2 | **PT** (Page Table) | **PTE** | Each entry maps a 4 KiB physical page. |
//!
//! Permissions are the intersection over the walk: a page is writable from
//! ring 0 only if both its PDE and PTE are writable (with CR0.WP set).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

#[macro_use]
mod entry_macros;

pub mod address_space;
mod frame_table_entry;
mod page_table;
mod pointer_table_entry;

pub use crate::address_space::KernelAddressSpace;
pub use crate::frame_table_entry::FrameTableEntry;
pub use crate::page_table::{PageDirectory, PageDirectoryEntry, PageTable, PageTableEntry};
pub use crate::pointer_table_entry::PointerTableEntry;

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_info::memory::{kernel_phys_to_virt, kernel_virt_to_phys};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Converts between pointers in the current address space and physical
/// addresses.
///
/// Typical patterns:
/// - **Kernel**: objects in the kernel image and the low MiB live at a fixed
///   offset, see [`HigherHalfMapper`].
/// - **Tests**: host buffers standing in for physical memory.
pub trait PhysMapper {
    /// The physical address backing `ptr`.
    fn virt_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress;

    /// A pointer through which physical address `pa` can be accessed.
    ///
    /// Producing the pointer is safe; dereferencing it requires that `pa` is
    /// mapped in the current page tables and holds a valid `T`.
    fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T;
}

/// The kernel's fixed higher-half offset mapping.
///
/// Valid for the kernel image and for physical memory mapped by the boot
/// page tables or [`KernelAddressSpace::build`].
#[derive(Copy, Clone, Debug, Default)]
pub struct HigherHalfMapper;

impl PhysMapper for HigherHalfMapper {
    #[inline]
    fn virt_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress {
        kernel_virt_to_phys(VirtualAddress::from_ptr(ptr))
    }

    #[inline]
    fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        core::ptr::with_exposed_provenance_mut(kernel_phys_to_virt(pa).as_u32() as usize)
    }
}

/// Drop the TLB entry for the page containing `va`.
///
/// # Safety
/// Must run in ring 0 on x86. On other targets (host tests) this is a no-op.
#[inline(always)]
pub unsafe fn invalidate_tlb_page(va: VirtualAddress) {
    #[cfg(target_arch = "x86")]
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) va.as_u32(), options(nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "x86"))]
    let _ = va;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_half_mapper_applies_kernel_offset() {
        let m = HigherHalfMapper;
        let p: *mut u8 = m.phys_to_ptr(PhysicalAddress::new(0x000B_8000));
        assert_eq!(p.addr(), 0xC00B_8000);
        assert_eq!(m.virt_to_phys(p.cast_const()), PhysicalAddress::new(0x000B_8000));
    }
}
