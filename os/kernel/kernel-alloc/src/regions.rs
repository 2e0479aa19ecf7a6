//! Usable physical memory, as reported by the boot loader.

use arrayvec::ArrayVec;
use kernel_info::boot::MemoryMapEntry;
use kernel_info::memory::MAX_MEMORY_REGIONS;
use kernel_memory_addresses::PhysicalAddress;
use log::trace;

/// End of the 32-bit physical address space.
pub(crate) const PHYSICAL_LIMIT: u64 = 1 << 32;

/// A contiguous range of usable physical memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: PhysicalAddress,
    /// Length in bytes; `base + length` never exceeds 4 GiB.
    pub length: u64,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u32, length: u64) -> Self {
        Self {
            base: PhysicalAddress::new(base),
            length,
        }
    }

    /// Exclusive end address.
    #[inline]
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.base.as_u32()) + self.length
    }
}

/// The regions of a memory map the frame allocator may hand out.
pub type MemoryRegions = ArrayVec<MemoryRegion, MAX_MEMORY_REGIONS>;

/// Collect the allocatable entries (available RAM and reclaimable ACPI
/// memory) of a memory map, clamped to the 32-bit physical address space.
///
/// Entries are kept in map order.
///
/// # Panics
/// If the map holds more than [`MAX_MEMORY_REGIONS`] allocatable entries.
pub fn usable_regions<I>(memory_map: I) -> MemoryRegions
where
    I: IntoIterator<Item = MemoryMapEntry>,
{
    let mut regions = MemoryRegions::new();
    for entry in memory_map {
        if !entry.kind.is_allocatable() {
            continue;
        }
        let Ok(base) = u32::try_from(entry.base) else {
            trace!("Ignoring memory above 4 GiB at {:#x}", entry.base);
            continue;
        };
        let length = entry.end().min(PHYSICAL_LIMIT) - entry.base;
        let region = MemoryRegion::new(base, length);
        assert!(
            regions.try_push(region).is_ok(),
            "more than {MAX_MEMORY_REGIONS} usable memory regions"
        );
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::boot::MemoryType;

    fn entry(base: u64, length: u64, kind: u32) -> MemoryMapEntry {
        MemoryMapEntry {
            base,
            length,
            kind: MemoryType::from_raw(kind),
        }
    }

    #[test]
    fn keeps_available_and_acpi_reclaimable() {
        let map = [
            entry(0, 0x9_FC00, 1),
            entry(0x9_FC00, 0x400, 2),
            entry(0xF_0000, 0x1_0000, 2),
            entry(0x10_0000, 0x7EE_0000, 1),
            entry(0x7FE_0000, 0x2_0000, 3),
            entry(0xFFFC_0000, 0x4_0000, 4),
        ];
        let regions = usable_regions(map);
        assert_eq!(
            regions.as_slice(),
            [
                MemoryRegion::new(0, 0x9_FC00),
                MemoryRegion::new(0x10_0000, 0x7EE_0000),
                MemoryRegion::new(0x7FE_0000, 0x2_0000),
            ]
        );
    }

    #[test]
    fn clamps_to_four_gib() {
        let map = [entry(0xC000_0000, 0x8000_0000, 1), entry(0x1_0000_0000, 0x1000_0000, 1)];
        let regions = usable_regions(map);
        assert_eq!(regions.as_slice(), [MemoryRegion::new(0xC000_0000, 0x4000_0000)]);
        assert_eq!(regions[0].end(), 1 << 32);
    }

    #[test]
    #[should_panic(expected = "usable memory regions")]
    fn too_many_regions_is_fatal() {
        let map = (0..=MAX_MEMORY_REGIONS as u64).map(|i| entry(i * 0x2000, 0x1000, 1));
        let _ = usable_regions(map);
    }
}
