//! # Kernel Address Space (32-bit, higher half)
//!
//! The kernel owns one page directory and 256 statically allocated page
//! tables covering `0xC000_0000..=0xFFFF_FFFF`. Because every kernel page
//! table exists up front, kernel mappings never need to allocate paging
//! structures and directory entries 768–1023 never change after boot.
//!
//! ## Building
//!
//! [`KernelAddressSpace::build`] runs once, before any allocator exists:
//!
//! 1. Directory entries below 768 are cleared; entries 768–1023 point at the
//!    physical address of the corresponding kernel page table.
//! 2. The first MiB of physical memory is mapped at [`KERNEL_BASE`] so the
//!    boot records and legacy device memory stay reachable.
//! 3. Every ELF section of the kernel image is mapped to where the boot
//!    loader placed it, writable only if the section is.
//!
//! The returned [`Cr3`] value must then be installed by the caller.
//!
//! ## Page indices
//!
//! The kernel tables are also addressed as one flat range of
//! [`KernelAddressSpace::PAGES`] pages, page `i` living in table `i / 1024`,
//! entry `i % 1024`, at virtual address `KERNEL_BASE + i * 4096`.

use crate::{PageDirectory, PageDirectoryEntry, PageTable, PageTableEntry, PhysMapper};
use kernel_info::elf::Elf32SectionHeader;
use kernel_info::memory::{
    FIRST_KERNEL_DIRECTORY_ENTRY, KERNEL_BASE, KERNEL_PAGE_TABLES, LOW_MEMORY_PAGES,
    PAGE_DIRECTORY_ENTRIES, PAGE_TABLE_ENTRIES, is_kernel_space,
};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, VirtualAddress};
use kernel_registers::cr3::Cr3;
use log::{debug, trace};

/// The kernel page directory together with its 256 page tables.
///
/// This is ~1 MiB; place it in a `static` or on the heap, never on the stack.
#[repr(C)]
pub struct KernelAddressSpace {
    directory: PageDirectory,
    tables: [PageTable; KERNEL_PAGE_TABLES],
}

impl KernelAddressSpace {
    /// Number of 4 KiB pages reachable through the kernel page tables.
    pub const PAGES: usize = KERNEL_PAGE_TABLES * PAGE_TABLE_ENTRIES;

    /// An address space with every entry cleared.
    #[must_use]
    pub const fn zeroed() -> Self {
        const EMPTY: PageTable = PageTable::zeroed();
        Self {
            directory: PageDirectory::zeroed(),
            tables: [EMPTY; KERNEL_PAGE_TABLES],
        }
    }

    /// Populate the directory and tables for the running kernel image and
    /// return the CR3 value that activates them.
    ///
    /// `mapper` must translate pointers into `self` to their physical
    /// addresses. `sections` are the kernel's ELF section headers.
    ///
    /// # Panics
    /// If a section extends past the reach of the kernel page tables.
    pub fn build<M, I>(&mut self, mapper: &M, sections: I) -> Cr3
    where
        M: PhysMapper,
        I: IntoIterator<Item = Elf32SectionHeader>,
    {
        self.link_kernel_tables(mapper);
        self.map_low_memory();

        let mut count = 0usize;
        for section in sections {
            self.map_section(&section);
            count += 1;
        }
        debug!("Mapped {count} kernel ELF sections");

        let directory = mapper.virt_to_phys(&raw const self.directory);
        Cr3::from_page_directory_phys(directory, false, false)
    }

    fn link_kernel_tables<M: PhysMapper>(&mut self, mapper: &M) {
        for pde in 0..FIRST_KERNEL_DIRECTORY_ENTRY {
            self.directory.set(pde, PageDirectoryEntry::zero());
        }
        for (i, table) in self.tables.iter_mut().enumerate() {
            table.clear();
            let table_phys = mapper.virt_to_phys(&raw const *table);
            let entry = PageDirectoryEntry::zero()
                .with_present(true)
                .with_writable(true)
                .with_user_access(false)
                .with_address(table_phys);
            self.directory.set(FIRST_KERNEL_DIRECTORY_ENTRY + i, entry);
        }
    }

    fn map_low_memory(&mut self) {
        let table = &mut self.tables[0];
        let mut frame = PhysicalAddress::zero();
        for pte in 0..LOW_MEMORY_PAGES {
            table.set(pte, PageTableEntry::kernel_page(frame, true));
            frame += Size4K::SIZE;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn map_section(&mut self, section: &Elf32SectionHeader) {
        let start = section.physical_address();
        let first_page = (start.as_u32() >> Size4K::SHIFT) as usize;
        let pages = section.size.div_ceil(Size4K::SIZE) as usize;
        let writable = section.is_writable();

        for page in first_page..first_page + pages {
            assert!(
                page < Self::PAGES,
                "ELF section at {:#010x} ({} bytes) exceeds the kernel page tables",
                section.addr,
                section.size
            );

            let entry = self.page_mut(page);
            if entry.present() && entry.writable() != writable {
                debug!(
                    "Page {} shared by sections with different write flags; now writable={writable}",
                    Self::page_address(page)
                );
            }

            let frame = PhysicalAddress::new((page as u32) << Size4K::SHIFT);
            *entry = PageTableEntry::kernel_page(frame, writable);
        }
    }

    /// The page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    /// The kernel page table behind directory entry `768 + index`.
    #[inline]
    #[must_use]
    pub const fn table(&self, index: usize) -> &PageTable {
        &self.tables[index]
    }

    /// Kernel page `index` of the flat page range.
    #[inline]
    #[must_use]
    pub const fn page(&self, index: usize) -> PageTableEntry {
        self.tables[index / PAGE_TABLE_ENTRIES].get(index % PAGE_TABLE_ENTRIES)
    }

    /// Mutable access to kernel page `index` of the flat page range.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn page_mut(&mut self, index: usize) -> &mut PageTableEntry {
        self.tables[index / PAGE_TABLE_ENTRIES].get_mut(index % PAGE_TABLE_ENTRIES)
    }

    /// Virtual address of kernel page `index`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_address(index: usize) -> VirtualAddress {
        debug_assert!(index < Self::PAGES);
        VirtualAddress::new(KERNEL_BASE + ((index as u32) << Size4K::SHIFT))
    }

    /// Flat page index of `va`, if it is a kernel address.
    #[inline]
    #[must_use]
    pub const fn page_index(va: VirtualAddress) -> Option<usize> {
        if is_kernel_space(va.as_u32()) {
            Some(((va.as_u32() - KERNEL_BASE) >> Size4K::SHIFT) as usize)
        } else {
            None
        }
    }

    /// The page-table entry mapping `va`, if `va` is a kernel address.
    #[inline]
    #[must_use]
    pub const fn page_table_entry(&self, va: VirtualAddress) -> Option<PageTableEntry> {
        match Self::page_index(va) {
            Some(index) => Some(self.page(index)),
            None => None,
        }
    }

    /// Translate a kernel virtual address through the kernel tables.
    ///
    /// Returns `None` for user-half addresses and unmapped pages.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.directory.get(va.directory_index()).present() {
            return None;
        }
        let entry = self.page_table_entry(va)?;
        if !entry.present() {
            return None;
        }
        entry.address().checked_add(va.offset::<Size4K>())
    }

    /// Log every non-zero directory and table entry at trace level.
    pub fn dump(&self) {
        trace!("Kernel page directory:");
        for pde in 0..PAGE_DIRECTORY_ENTRIES {
            let entry = self.directory.get(pde);
            if entry.value() != 0 {
                trace!("  PDE {pde:4} | {} {entry:?}", entry.address());
            }
        }

        trace!("Kernel page tables:");
        for (pt, table) in self.tables.iter().enumerate() {
            for (pte, entry) in table.entries().iter().enumerate() {
                if entry.value() != 0 {
                    trace!("  {pt:3} {pte:4} | {} {entry:?}", entry.address());
                }
            }
        }
    }
}

impl Default for KernelAddressSpace {
    fn default() -> Self {
        Self::zeroed()
    }
}
