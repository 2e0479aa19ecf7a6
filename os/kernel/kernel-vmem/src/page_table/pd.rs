use kernel_info::memory::PAGE_DIRECTORY_ENTRIES;

pointer_table_entry! {
    /// A page-directory entry (PDE).
    ///
    /// Points at the physical base of a [`PageTable`](crate::PageTable).
    #[doc(alias = "PDE")]
    pub struct PageDirectoryEntry {
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
        /// Page Size (PS, bit 7). Set for a 4 MiB page instead of a page table.
        7 => large_page / set_large_page / with_large_page,
    }
}

/// The page directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PageDirectoryEntry; PAGE_DIRECTORY_ENTRIES],
}

impl PageDirectory {
    /// Create a fully zeroed directory (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageDirectoryEntry::zero(); PAGE_DIRECTORY_ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PageDirectoryEntry {
        self.entries[i]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: usize, e: PageDirectoryEntry) {
        self.entries[i] = e;
    }

    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[PageDirectoryEntry; PAGE_DIRECTORY_ENTRIES] {
        &self.entries
    }
}

const _: () = assert!(size_of::<PageDirectory>() == 4096);

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn pde_flags_map_to_hardware_bits() {
        let e = PageDirectoryEntry::zero()
            .with_present(true)
            .with_writable(true)
            .with_address(PhysicalAddress::new(0x0010_5000));
        assert_eq!(e.value(), 0x0010_5003);
        assert!(!e.user_access());
        assert!(!e.large_page());

        let e = PageDirectoryEntry::from_value(0x80);
        assert!(e.large_page());
        assert!(!e.present());
    }

    #[test]
    fn directory_starts_empty() {
        let pd = PageDirectory::zeroed();
        assert!(pd.entries().iter().all(|e| e.value() == 0));
    }
}
