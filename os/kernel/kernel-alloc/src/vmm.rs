//! Kernel virtual memory manager.
//!
//! Owns the kernel address space together with the frame allocator and keeps
//! the two consistent: every frame mapped by a present kernel page is marked
//! in use, and pages handed out by [`KernelVmm::allocate_kernel_pages`] are
//! backed by freshly requested frames.
//!
//! # Example
//! ```ignore
//! let mut vmm = KernelVmm::new(space, frames);
//! vmm.synchronize();
//! let buffer = vmm.allocate_kernel_pages(4)?;
//! // ...
//! vmm.free_kernel_pages(buffer, 4)?;
//! ```

use crate::{FrameAlloc, MemoryError};
use kernel_info::memory::{
    LOW_MEMORY_PAGES, MAX_KERNEL_PAGES_PER_ALLOCATION, PAGE_TABLE_ENTRIES, is_kernel_space,
};
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};
use kernel_vmem::{KernelAddressSpace, PageTableEntry, invalidate_tlb_page};
use log::{debug, error, info};

/// The kernel's virtual memory manager.
pub struct KernelVmm<'m, A: FrameAlloc> {
    space: &'m mut KernelAddressSpace,
    frames: A,
    /// Kernel page index at which the next search for free pages starts.
    cursor: usize,
}

impl<'m, A: FrameAlloc> KernelVmm<'m, A> {
    #[must_use]
    pub const fn new(space: &'m mut KernelAddressSpace, frames: A) -> Self {
        Self {
            space,
            frames,
            cursor: 0,
        }
    }

    /// Reserve the frame behind every present kernel page.
    ///
    /// Pages in the low MiB window are exempt: that memory is mostly firmware
    /// and device memory the frame allocator never manages.
    ///
    /// # Panics
    /// If any other mapped frame cannot be reserved.
    pub fn synchronize(&mut self) {
        info!("Synchronizing page tables with the page frame manager");
        debug!("  {} reserved page frames before", self.frames.reserved_frames());

        for index in 0..KernelAddressSpace::PAGES {
            let entry = self.space.page(index);
            if !entry.present() {
                continue;
            }

            let result = self.frames.reserve_frame(entry.address());
            if index < LOW_MEMORY_PAGES {
                continue;
            }
            if let Err(err) = result {
                error!(
                    "{err} while reserving {} at table {} entry {}",
                    entry.address(),
                    index / PAGE_TABLE_ENTRIES,
                    index % PAGE_TABLE_ENTRIES
                );
                panic!("kernel page tables reference an unmanaged or shared frame");
            }
        }

        debug!("  {} reserved page frames after", self.frames.reserved_frames());
    }

    /// Map `pages` consecutive kernel pages backed by new frames and return
    /// the address of the first.
    ///
    /// The search for unmapped pages starts where the previous allocation
    /// ended and wraps around once.
    ///
    /// # Errors
    /// [`MemoryError::NoPageFramesAvailable`] if the frame allocator runs dry;
    /// pages mapped so far are released again.
    ///
    /// # Panics
    /// If `pages` is not in `1..=127` or no run of `pages` unmapped kernel
    /// pages exists.
    pub fn allocate_kernel_pages(&mut self, pages: usize) -> Result<VirtualAddress, MemoryError> {
        assert_page_count(pages);
        let Some(start) = self.find_unmapped_run(pages) else {
            panic!("out of addressable memory in kernel space ({pages} pages requested)");
        };

        for i in 0..pages {
            let frame = match self.frames.request_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    self.unmap_partial_run(start, i);
                    return Err(err);
                }
            };
            let entry = self.space.page_mut(start + i);
            debug_assert!(!entry.present());
            *entry = PageTableEntry::kernel_page(frame, true);
        }

        self.cursor = (start + pages) % KernelAddressSpace::PAGES;
        let address = KernelAddressSpace::page_address(start);
        debug!("Allocated {pages} kernel pages at {address}");
        Ok(address)
    }

    /// Unmap `pages` kernel pages starting at `address` and return their
    /// frames to the allocator.
    ///
    /// Every page of the run is unmapped even if returning one of the frames
    /// fails.
    ///
    /// # Errors
    /// The first frame allocator error, e.g. when a frame was already freed.
    ///
    /// # Panics
    /// If `pages` is not in `1..=127`, `address` is not a page-aligned kernel
    /// address, or any of the pages is not mapped.
    pub fn free_kernel_pages(
        &mut self,
        address: VirtualAddress,
        pages: usize,
    ) -> Result<(), MemoryError> {
        assert_page_count(pages);
        assert!(
            is_kernel_space(address.as_u32()),
            "{address} is not a kernel address"
        );
        assert!(address.is_aligned::<Size4K>(), "{address} is not page aligned");
        let Some(start) = KernelAddressSpace::page_index(address) else {
            unreachable!("kernel addresses always have a page index");
        };
        assert!(
            start + pages <= KernelAddressSpace::PAGES,
            "{pages} pages at {address} run past the end of kernel space"
        );

        for index in start..start + pages {
            assert!(
                self.space.page(index).present(),
                "kernel page {} is not mapped",
                KernelAddressSpace::page_address(index)
            );
        }

        let mut result = Ok(());
        for index in start..start + pages {
            let frame = self.unmap(index);
            if let Err(err) = self.frames.free_frame(frame) {
                error!("{err} while freeing frame {frame} of kernel page {index}");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        debug!("Freed {pages} kernel pages at {address}");
        result
    }

    /// Clear the present bit of kernel page `index` and return its frame.
    fn unmap(&mut self, index: usize) -> PhysicalAddress {
        let va = KernelAddressSpace::page_address(index);
        let entry = self.space.page_mut(index);
        assert!(entry.present(), "kernel page {va} is not mapped");
        entry.set_present(false);
        // SAFETY: only kernel-half pages are touched, and the kernel runs in ring 0.
        unsafe { invalidate_tlb_page(va) };
        entry.address()
    }

    fn unmap_partial_run(&mut self, start: usize, mapped: usize) {
        for index in start..start + mapped {
            let frame = self.unmap(index);
            if let Err(err) = self.frames.free_frame(frame) {
                error!("{err} while returning frame {frame} of a failed allocation");
            }
        }
    }

    /// First index of `pages` consecutive unmapped kernel pages, searching
    /// from the cursor to the end and then from the start. Runs never wrap
    /// past the last kernel page.
    fn find_unmapped_run(&self, pages: usize) -> Option<usize> {
        let total = KernelAddressSpace::PAGES;
        let cursor = self.cursor.min(total);
        let wrapped_end = (cursor + pages - 1).min(total);

        let mut run = 0usize;
        for index in (cursor..total).chain(0..wrapped_end) {
            if index == 0 {
                run = 0;
            }
            if self.space.page(index).present() {
                run = 0;
                continue;
            }
            run += 1;
            if run == pages {
                return Some(index + 1 - pages);
            }
        }
        None
    }

    /// The managed address space.
    #[inline]
    #[must_use]
    pub fn address_space(&self) -> &KernelAddressSpace {
        self.space
    }

    /// The frame allocator.
    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &A {
        &self.frames
    }

    /// Mutable access to the frame allocator, for frames that are not mapped
    /// into kernel space.
    #[inline]
    pub const fn frames_mut(&mut self) -> &mut A {
        &mut self.frames
    }

    /// Translate a kernel virtual address to its physical address.
    #[inline]
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.space.translate(va)
    }
}

fn assert_page_count(pages: usize) {
    assert!(
        (1..=MAX_KERNEL_PAGES_PER_ALLOCATION).contains(&pages),
        "kernel page count {pages} not in 1..={MAX_KERNEL_PAGES_PER_ALLOCATION}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryRegion, PageFrameManager};
    use kernel_vmem::FrameTableEntry;

    fn new_space() -> Box<KernelAddressSpace> {
        // SAFETY: all-zero bytes are a valid (empty) address space.
        unsafe { Box::<KernelAddressSpace>::new_zeroed().assume_init() }
    }

    /// Map the low MiB and `image_pages` pages of a kernel image at 1 MiB,
    /// the way the boot-time builder does.
    fn boot_space(image_pages: usize) -> Box<KernelAddressSpace> {
        let mut space = new_space();
        for index in 0..LOW_MEMORY_PAGES + image_pages {
            let frame = PhysicalAddress::new(u32::try_from(index * 4096).unwrap());
            *space.page_mut(index) = PageTableEntry::kernel_page(frame, true);
        }
        space
    }

    fn frames<'a>(
        storage: &'a mut [FrameTableEntry],
        regions: &[MemoryRegion],
    ) -> PageFrameManager<'a> {
        let mut pfm = PageFrameManager::new(storage);
        pfm.initialize(regions);
        pfm
    }

    #[test]
    fn synchronize_reserves_mapped_frames() {
        let mut space = boot_space(16);
        let mut storage = vec![FrameTableEntry::zero(); 1024];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x40_0000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        vmm.synchronize();

        assert_eq!(vmm.frames().reserved_frames(), 16);
        for i in 0..1024 {
            let e = vmm.frames().frame_at_index(i).unwrap();
            assert_eq!(e.in_use(), i < 16, "frame {i}");
        }
    }

    #[test]
    fn synchronize_ignores_unmanaged_low_memory() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 16];
        // part of the low MiB is usable RAM, the rest is not managed at all
        let pfm = frames(&mut storage, &[MemoryRegion::new(0, 0x8000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        vmm.synchronize();
        assert_eq!(vmm.frames().reserved_frames(), 8);
    }

    #[test]
    #[should_panic(expected = "unmanaged or shared frame")]
    fn synchronize_panics_on_unmanaged_kernel_frame() {
        let mut space = boot_space(4);
        let mut storage = vec![FrameTableEntry::zero(); 16];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_1000, 0x8000)]);
        KernelVmm::new(&mut space, pfm).synchronize();
    }

    #[test]
    fn allocate_maps_fresh_frames_after_the_image() {
        let mut space = boot_space(16);
        let mut storage = vec![FrameTableEntry::zero(); 64];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x4_0000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);
        vmm.synchronize();

        let va = vmm.allocate_kernel_pages(3).unwrap();
        assert_eq!(va, VirtualAddress::new(0xC011_0000));
        for i in 0..3 {
            let page = va + i * 4096;
            let e = vmm.address_space().page_table_entry(page).unwrap();
            assert!(e.present() && e.writable() && !e.user_access());
            assert!(e.address().as_u32() >= 0x11_0000);
        }
        assert_eq!(vmm.frames().reserved_frames(), 19);

        let next = vmm.allocate_kernel_pages(1).unwrap();
        assert_eq!(next, VirtualAddress::new(0xC011_3000));
    }

    #[test]
    fn allocate_then_free_restores_state() {
        let mut space = boot_space(16);
        let mut storage = vec![FrameTableEntry::zero(); 64];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x4_0000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);
        vmm.synchronize();
        let before = vmm.frames().reserved_frames();

        let va = vmm.allocate_kernel_pages(5).unwrap();
        assert_eq!(vmm.frames().reserved_frames(), before + 5);
        vmm.free_kernel_pages(va, 5).unwrap();

        assert_eq!(vmm.frames().reserved_frames(), before);
        for i in 0..5 {
            let e = vmm.address_space().page_table_entry(va + i * 4096).unwrap();
            assert!(!e.present());
        }
    }

    #[test]
    fn freed_pages_are_reused_after_wrap() {
        let mut space = new_space();
        for index in 3..KernelAddressSpace::PAGES {
            space.page_mut(index).set_present(true);
        }
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        let a = vmm.allocate_kernel_pages(2).unwrap();
        assert_eq!(a, VirtualAddress::new(0xC000_0000));
        let b = vmm.allocate_kernel_pages(1).unwrap();
        assert_eq!(b, VirtualAddress::new(0xC000_2000));

        vmm.free_kernel_pages(a, 2).unwrap();
        // the cursor sits past `b`; the search wraps back to the start
        let c = vmm.allocate_kernel_pages(2).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn frame_exhaustion_rolls_back_partial_run() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x2000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        assert_eq!(vmm.allocate_kernel_pages(3), Err(MemoryError::NoPageFramesAvailable));
        assert_eq!(vmm.frames().reserved_frames(), 0);
        let first = KernelAddressSpace::page_address(LOW_MEMORY_PAGES);
        for i in 0..3 {
            assert!(!vmm.address_space().page_table_entry(first + i * 4096).unwrap().present());
        }

        // the same pages are handed out once memory is available
        assert_eq!(vmm.allocate_kernel_pages(2), Ok(first));
    }

    #[test]
    fn free_propagates_allocator_errors() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        let va = vmm.allocate_kernel_pages(1).unwrap();
        let frame = vmm.address_space().page_table_entry(va).unwrap().address();
        vmm.frames_mut().free_frame(frame).unwrap();
        assert_eq!(vmm.free_kernel_pages(va, 1), Err(MemoryError::PageFrameAlreadyFree));
    }

    #[test]
    fn free_releases_the_whole_run_despite_an_error() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let mut vmm = KernelVmm::new(&mut space, pfm);

        let va = vmm.allocate_kernel_pages(3).unwrap();
        let frame = vmm.address_space().page_table_entry(va).unwrap().address();
        vmm.frames_mut().free_frame(frame).unwrap();
        assert_eq!(vmm.frames().reserved_frames(), 2);

        assert_eq!(vmm.free_kernel_pages(va, 3), Err(MemoryError::PageFrameAlreadyFree));
        assert_eq!(vmm.frames().reserved_frames(), 0);
        for i in 0..3 {
            assert!(!vmm.address_space().page_table_entry(va + i * 4096).unwrap().present());
        }

        // all three frames can be handed out again
        assert!(vmm.allocate_kernel_pages(3).is_ok());
        assert_eq!(vmm.frames().reserved_frames(), 3);
    }

    #[test]
    #[should_panic(expected = "not in 1..=127")]
    fn zero_pages_is_fatal() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).allocate_kernel_pages(0);
    }

    #[test]
    #[should_panic(expected = "not in 1..=127")]
    fn too_many_pages_is_fatal() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).allocate_kernel_pages(128);
    }

    #[test]
    #[should_panic(expected = "out of addressable memory")]
    fn full_kernel_space_is_fatal() {
        let mut space = new_space();
        for index in (0..KernelAddressSpace::PAGES).step_by(2) {
            space.page_mut(index).set_present(true);
        }
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).allocate_kernel_pages(2);
    }

    #[test]
    #[should_panic(expected = "is not mapped")]
    fn freeing_unmapped_page_is_fatal() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).free_kernel_pages(VirtualAddress::new(0xC100_0000), 1);
    }

    #[test]
    #[should_panic(expected = "not a kernel address")]
    fn freeing_user_address_is_fatal() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).free_kernel_pages(VirtualAddress::new(0x0040_0000), 1);
    }

    #[test]
    #[should_panic(expected = "not page aligned")]
    fn freeing_unaligned_address_is_fatal() {
        let mut space = boot_space(0);
        let mut storage = vec![FrameTableEntry::zero(); 8];
        let pfm = frames(&mut storage, &[MemoryRegion::new(0x10_0000, 0x8000)]);
        let _ = KernelVmm::new(&mut space, pfm).free_kernel_pages(VirtualAddress::new(0xC100_0010), 1);
    }
}
