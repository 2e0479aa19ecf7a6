use kernel_info::memory::PAGE_TABLE_ENTRIES;

pointer_table_entry! {
    /// A page-table entry (PTE). Maps one 4 KiB frame.
    #[doc(alias = "PTE")]
    pub struct PageTableEntry {
        /// Present (P, bit 0).
        0 => present / set_present / with_present,
        /// Writable (RW, bit 1).
        1 => writable / set_writable / with_writable,
        /// User/Supervisor (US, bit 2). Clear restricts access to ring 0.
        2 => user_access / set_user_access / with_user_access,
        /// Page Write-Through (PWT, bit 3).
        3 => write_through / set_write_through / with_write_through,
        /// Page Cache Disable (PCD, bit 4).
        4 => cache_disabled / set_cache_disabled / with_cache_disabled,
        /// Accessed (A, bit 5). Set by the CPU.
        5 => accessed / set_accessed / with_accessed,
        /// Dirty (D, bit 6). Set by the CPU on the first write.
        6 => dirty / set_dirty / with_dirty,
        /// Global (G, bit 8). Survives CR3 reloads when CR4.PGE is set.
        8 => global_translation / set_global_translation / with_global_translation,
    }
}

impl PageTableEntry {
    /// A present, supervisor-only mapping of `pa`.
    #[inline]
    #[must_use]
    pub const fn kernel_page(pa: kernel_memory_addresses::PhysicalAddress, writable: bool) -> Self {
        Self::zero()
            .with_present(true)
            .with_writable(writable)
            .with_user_access(false)
            .with_address(pa)
    }
}

/// A page table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; PAGE_TABLE_ENTRIES],
}

impl PageTable {
    /// Create a fully zeroed table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageTableEntry::zero(); PAGE_TABLE_ENTRIES],
        }
    }

    /// Reset every entry to zero.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(PageTableEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PageTableEntry {
        self.entries[i]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: usize, e: PageTableEntry) {
        self.entries[i] = e;
    }

    #[inline]
    pub const fn get_mut(&mut self, i: usize) -> &mut PageTableEntry {
        &mut self.entries[i]
    }

    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[PageTableEntry; PAGE_TABLE_ENTRIES] {
        &self.entries
    }
}

const _: () = assert!(size_of::<PageTable>() == 4096);
