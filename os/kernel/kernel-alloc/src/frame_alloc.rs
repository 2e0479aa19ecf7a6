//! Physical frame allocator.
//!
//! A table with one [`FrameTableEntry`] per 4 KiB frame of usable RAM, in
//! ascending address order. Allocation scans circularly from a rotating
//! cursor for the first free frame; reservation and release look the frame
//! up by address.
//!
//! The table storage is provided by the caller: the kernel uses a static
//! table large enough for the whole 32-bit physical address space, tests use
//! a `Vec`.

use crate::regions::PHYSICAL_LIMIT;
use crate::{MemoryError, MemoryRegion};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};
use kernel_vmem::FrameTableEntry;
use log::{debug, trace};

/// Source of physical 4 KiB frames.
pub trait FrameAlloc {
    /// Hand out one free frame.
    ///
    /// # Errors
    /// [`MemoryError::NoPageFramesAvailable`] if every frame is in use.
    fn request_frame(&mut self) -> Result<PhysicalAddress, MemoryError>;

    /// Mark the frame at `pa` as in use without handing it out.
    ///
    /// # Errors
    /// [`MemoryError::UnalignedAddress`], [`MemoryError::InvalidPageFrameAddress`]
    /// or [`MemoryError::PageFrameAlreadyInUse`].
    fn reserve_frame(&mut self, pa: PhysicalAddress) -> Result<(), MemoryError>;

    /// Return the frame at `pa`.
    ///
    /// # Errors
    /// [`MemoryError::UnalignedAddress`], [`MemoryError::InvalidPageFrameAddress`]
    /// or [`MemoryError::PageFrameAlreadyFree`].
    fn free_frame(&mut self, pa: PhysicalAddress) -> Result<(), MemoryError>;

    /// Number of frames currently in use.
    fn reserved_frames(&self) -> usize;
}

/// Linear-scan frame allocator over caller-provided table storage.
pub struct PageFrameManager<'s> {
    frames: &'s mut [FrameTableEntry],
    num_frames: usize,
    next_frame: usize,
}

impl<'s> PageFrameManager<'s> {
    /// An empty manager. Call [`initialize`](Self::initialize) before use.
    #[must_use]
    pub const fn new(storage: &'s mut [FrameTableEntry]) -> Self {
        Self {
            frames: storage,
            num_frames: 0,
            next_frame: 0,
        }
    }

    /// Build the frame table from `regions`, which must be sorted by base
    /// address and must not overlap.
    ///
    /// Each region's base is rounded up to the next 4 KiB boundary and its
    /// length shrunk by the same amount; every whole 4 KiB span that remains
    /// becomes one free frame. All frames start free and the cursor is reset.
    ///
    /// # Panics
    /// If the regions are unsorted or overlapping, extend past 4 GiB, or hold
    /// more frames than the table storage.
    pub fn initialize(&mut self, regions: &[MemoryRegion]) {
        let frame_size = u64::from(Size4K::SIZE);
        let mut previous_end: Option<u64> = None;
        let mut count = 0usize;

        for region in regions {
            let start = u64::from(region.base.as_u32());
            let end = region.end();
            if let Some(previous_end) = previous_end {
                assert!(
                    start >= previous_end && end > previous_end,
                    "memory regions not sorted or overlapping: {} (+{:#x}) after end {previous_end:#x}",
                    region.base,
                    region.length
                );
            }
            previous_end = Some(end);
            assert!(
                end <= PHYSICAL_LIMIT,
                "memory region {} (+{:#x}) extends past 4 GiB",
                region.base,
                region.length
            );

            let first = start.next_multiple_of(frame_size);
            let frames = end.saturating_sub(first) / frame_size;
            trace!("  region {} (+{:#x}): {frames} frames", region.base, region.length);

            for i in 0..frames {
                let slot = self
                    .frames
                    .get_mut(count)
                    .unwrap_or_else(|| panic!("frame table capacity of {count} frames exceeded"));
                let address = first + i * frame_size;
                #[allow(clippy::cast_possible_truncation)]
                let address = PhysicalAddress::new(address as u32);
                *slot = FrameTableEntry::free(address);
                count += 1;
            }
        }

        self.num_frames = count;
        self.next_frame = 0;
        debug!("Page frame manager: {count} frames in {} regions", regions.len());
    }

    /// Number of frames managed.
    #[inline]
    #[must_use]
    pub const fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// The table entry at `index`, if within [`num_frames`](Self::num_frames).
    #[inline]
    #[must_use]
    pub fn frame_at_index(&self, index: usize) -> Option<FrameTableEntry> {
        self.table().get(index).copied()
    }

    /// Index at which the next [`request_frame`](FrameAlloc::request_frame) starts scanning.
    #[inline]
    #[must_use]
    pub const fn next_frame(&self) -> usize {
        self.next_frame
    }

    /// Number of frames not in use.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.num_frames - self.reserved_frames()
    }

    #[inline]
    fn table(&self) -> &[FrameTableEntry] {
        &self.frames[..self.num_frames]
    }

    #[inline]
    fn table_mut(&mut self) -> &mut [FrameTableEntry] {
        &mut self.frames[..self.num_frames]
    }

    /// Locate the table entry for `pa`.
    fn index_of(&self, pa: PhysicalAddress) -> Result<usize, MemoryError> {
        if !pa.is_aligned::<Size4K>() {
            return Err(MemoryError::UnalignedAddress);
        }
        self.table()
            .binary_search_by_key(&pa, |e| e.address())
            .map_err(|_| MemoryError::InvalidPageFrameAddress)
    }
}

impl FrameAlloc for PageFrameManager<'_> {
    fn request_frame(&mut self) -> Result<PhysicalAddress, MemoryError> {
        let n = self.num_frames;
        let start = self.next_frame;
        let table = self.table_mut();

        for offset in 0..n {
            let index = (start + offset) % n;
            let entry = &mut table[index];
            if !entry.in_use() {
                entry.set_in_use(true);
                let address = entry.address();
                self.next_frame = (index + 1) % n;
                return Ok(address);
            }
        }
        Err(MemoryError::NoPageFramesAvailable)
    }

    fn reserve_frame(&mut self, pa: PhysicalAddress) -> Result<(), MemoryError> {
        let index = self.index_of(pa)?;
        let entry = &mut self.table_mut()[index];
        if entry.in_use() {
            return Err(MemoryError::PageFrameAlreadyInUse);
        }
        entry.set_in_use(true);
        Ok(())
    }

    fn free_frame(&mut self, pa: PhysicalAddress) -> Result<(), MemoryError> {
        let index = self.index_of(pa)?;
        let entry = &mut self.table_mut()[index];
        if !entry.in_use() {
            return Err(MemoryError::PageFrameAlreadyFree);
        }
        entry.set_in_use(false);
        Ok(())
    }

    fn reserved_frames(&self) -> usize {
        self.table().iter().filter(|e| e.in_use()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(n: usize) -> Vec<FrameTableEntry> {
        vec![FrameTableEntry::zero(); n]
    }

    fn pa(v: u32) -> PhysicalAddress {
        PhysicalAddress::new(v)
    }

    #[test]
    fn frames_are_page_aligned_and_skip_padding() {
        let mut table = storage(16);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 4096), MemoryRegion::new(12288, 8192)]);

        assert_eq!(pfm.num_frames(), 3);
        let addresses: Vec<_> = (0..3)
            .map(|i| pfm.frame_at_index(i).unwrap().address().as_u32())
            .collect();
        assert_eq!(addresses, [0x0000, 0x3000, 0x4000]);
        assert!(pfm.frame_at_index(3).is_none());
    }

    #[test]
    fn region_ending_at_4_gib_is_accepted() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0xFFFF_E000, 0x2000)]);
        assert_eq!(pfm.num_frames(), 2);
        assert_eq!(pfm.frame_at_index(1).unwrap().address(), pa(0xFFFF_F000));
    }

    #[test]
    #[should_panic(expected = "extends past 4 GiB")]
    fn region_past_4_gib_is_fatal() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0xFFFF_F000, 0x2000)]);
    }

    #[test]
    fn region_shorter_than_a_frame_after_rounding_is_empty() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(1, 4096)]);
        assert_eq!(pfm.num_frames(), 0);
        assert_eq!(pfm.request_frame(), Err(MemoryError::NoPageFramesAvailable));
    }

    #[test]
    fn unaligned_base_shrinks_length() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0x0800, 0x3000)]);
        // [0x1000, 0x3800) holds two whole frames
        assert_eq!(pfm.num_frames(), 2);
        assert_eq!(pfm.frame_at_index(0).unwrap().address(), pa(0x1000));
        assert_eq!(pfm.frame_at_index(1).unwrap().address(), pa(0x2000));
    }

    #[test]
    fn request_until_exhausted_then_reserve_errors() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 8192)]);

        assert_eq!(pfm.request_frame(), Ok(pa(0x0000)));
        assert_eq!(pfm.request_frame(), Ok(pa(0x1000)));
        assert_eq!(pfm.request_frame(), Err(MemoryError::NoPageFramesAvailable));
        assert_eq!(pfm.reserve_frame(pa(4000)), Err(MemoryError::UnalignedAddress));
        assert_eq!(pfm.reserve_frame(pa(0)), Err(MemoryError::PageFrameAlreadyInUse));
        assert_eq!(pfm.reserved_frames(), 2);
        assert_eq!(pfm.free_frames(), 0);
    }

    #[test]
    fn freed_frame_can_be_requested_again() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0x10_0000, 0x2000)]);

        let a = pfm.request_frame().unwrap();
        let b = pfm.request_frame().unwrap();
        assert_ne!(a, b);
        assert_eq!(pfm.free_frame(a), Ok(()));
        assert_eq!(pfm.free_frame(a), Err(MemoryError::PageFrameAlreadyFree));
        assert_eq!(pfm.request_frame(), Ok(a));
    }

    #[test]
    fn cursor_rotates_past_last_grant() {
        let mut table = storage(8);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 0x4000)]);

        assert_eq!(pfm.request_frame(), Ok(pa(0x0000)));
        assert_eq!(pfm.request_frame(), Ok(pa(0x1000)));
        pfm.free_frame(pa(0x0000)).unwrap();
        // nearest free frame from the cursor, not the lowest address
        assert_eq!(pfm.request_frame(), Ok(pa(0x2000)));
        assert_eq!(pfm.request_frame(), Ok(pa(0x3000)));
        assert_eq!(pfm.next_frame(), 0);
        assert_eq!(pfm.request_frame(), Ok(pa(0x0000)));
    }

    #[test]
    fn every_frame_is_granted_once() {
        let mut table = storage(64);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 0x8000), MemoryRegion::new(0x10_0000, 0x10_000)]);

        let n = pfm.num_frames();
        let mut granted: Vec<_> = (0..n).map(|_| pfm.request_frame().unwrap()).collect();
        assert_eq!(pfm.request_frame(), Err(MemoryError::NoPageFramesAvailable));
        granted.sort();
        granted.dedup();
        assert_eq!(granted.len(), n);
        assert_eq!(pfm.reserved_frames(), n);
    }

    #[test]
    fn unknown_addresses_are_invalid() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0x10_0000, 0x2000)]);
        assert_eq!(pfm.reserve_frame(pa(0x5000)), Err(MemoryError::InvalidPageFrameAddress));
        assert_eq!(pfm.free_frame(pa(0x10_2000)), Err(MemoryError::InvalidPageFrameAddress));
        assert_eq!(pfm.free_frame(pa(0x10_0001)), Err(MemoryError::UnalignedAddress));
    }

    #[test]
    #[should_panic(expected = "not sorted or overlapping")]
    fn unsorted_regions_are_fatal() {
        let mut table = storage(16);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0x4000, 0x1000), MemoryRegion::new(0, 0x1000)]);
    }

    #[test]
    #[should_panic(expected = "not sorted or overlapping")]
    fn overlapping_regions_are_fatal() {
        let mut table = storage(16);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 0x3000), MemoryRegion::new(0x2000, 0x3000)]);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn exceeding_storage_is_fatal() {
        let mut table = storage(2);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 0x3000)]);
    }

    #[test]
    fn reinitialize_resets_state() {
        let mut table = storage(4);
        let mut pfm = PageFrameManager::new(&mut table);
        pfm.initialize(&[MemoryRegion::new(0, 0x2000)]);
        pfm.request_frame().unwrap();
        pfm.initialize(&[MemoryRegion::new(0, 0x2000)]);
        assert_eq!(pfm.reserved_frames(), 0);
        assert_eq!(pfm.next_frame(), 0);
    }
}
