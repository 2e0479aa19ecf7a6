//! # Memory Layout

use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, Size4M, VirtualAddress};

/// Where the kernel executes (VMA); everything at or above this address is
/// kernel space. Matches the linker script's higher-half base.
pub const KERNEL_BASE: u32 = 0xC000_0000;

/// Where the boot loader places the kernel image in *physical* memory (LMA).
pub const PHYS_LOAD: u32 = 0x0010_0000; // 1 MiB

/// Number of entries in a page directory.
pub const PAGE_DIRECTORY_ENTRIES: usize = 1024;

/// Number of entries in a page table.
pub const PAGE_TABLE_ENTRIES: usize = 1024;

/// First page-directory entry belonging to kernel space.
pub const FIRST_KERNEL_DIRECTORY_ENTRY: usize = (KERNEL_BASE >> Size4M::SHIFT) as usize;

/// Page tables statically backing the kernel half (1 GiB reach).
pub const KERNEL_PAGE_TABLES: usize = PAGE_DIRECTORY_ENTRIES - FIRST_KERNEL_DIRECTORY_ENTRY;

/// Pages of low physical memory mapped at [`KERNEL_BASE`] so device memory
/// (VGA text buffer, BIOS data) stays reachable once paging is on.
pub const LOW_MEMORY_PAGES: usize = (PHYS_LOAD / Size4K::SIZE) as usize;

/// Frame-table entries reserved for the physical frame allocator; covers the
/// full 32-bit physical address space.
pub const FRAME_TABLE_CAPACITY: usize = 1024 * 1024;

/// Usable memory regions accepted from the boot memory map.
pub const MAX_MEMORY_REGIONS: usize = 32;

/// Upper bound on pages handed out by a single kernel page allocation.
pub const MAX_KERNEL_PAGES_PER_ALLOCATION: usize = 127;

const _: () = {
    assert!(KERNEL_BASE.is_multiple_of(Size4M::SIZE));
    assert!(FIRST_KERNEL_DIRECTORY_ENTRY == 768);
    assert!(KERNEL_PAGE_TABLES == 256);
    assert!(LOW_MEMORY_PAGES <= PAGE_TABLE_ENTRIES);
    assert!(FRAME_TABLE_CAPACITY as u64 * Size4K::SIZE as u64 == 1 << 32);
    assert!(MAX_KERNEL_PAGES_PER_ALLOCATION < PAGE_TABLE_ENTRIES);
};

/// Whether `address` lies in the kernel half of the virtual address space.
#[inline]
#[must_use]
pub const fn is_kernel_space(address: u32) -> bool {
    address >= KERNEL_BASE
}

/// Translate the virtual address of a kernel-image object to its physical
/// address.
///
/// Only valid for memory placed by the linker (kernel text, data and BSS) or
/// for the low-memory window at [`KERNEL_BASE`].
#[inline]
#[must_use]
pub const fn kernel_virt_to_phys(va: VirtualAddress) -> PhysicalAddress {
    debug_assert!(is_kernel_space(va.as_u32()));
    PhysicalAddress::new(va.as_u32() - KERNEL_BASE)
}

/// Inverse of [`kernel_virt_to_phys`].
///
/// Boot-loader structures below 1 MiB and the kernel image are reachable this
/// way once the kernel page directory is active.
#[inline]
#[must_use]
pub const fn kernel_phys_to_virt(pa: PhysicalAddress) -> VirtualAddress {
    debug_assert!(pa.as_u32() < KERNEL_BASE.wrapping_neg());
    VirtualAddress::new(pa.as_u32() + KERNEL_BASE)
}
