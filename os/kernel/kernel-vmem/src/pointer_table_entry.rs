use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// A 32-bit "pointer + status" word, the common layout of every paging record
/// on 32-bit x86 without PAE.
///
/// ### Bit layout
///
/// | Bits   | Meaning |
/// |--------|---------|
/// | 0–11   | Status bits, interpreted by the concrete entry type |
/// | 12–31  | Physical frame bits [31:12] |
///
/// Addresses are stored without their low 12 bits, so any address written is
/// truncated to its 4 KiB boundary.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PointerTableEntry;
/// let mut e = PointerTableEntry::new();
/// e.set_address(PhysicalAddress::new(0x0012_3456));
/// e.set_status_flag(0, true);
/// assert_eq!(e.address(), PhysicalAddress::new(0x0012_3000));
/// assert_eq!(e.value(), 0x0012_3001);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PointerTableEntry {
    /// Status bits (bits 0..=11).
    #[bits(12)]
    status: u16,

    /// Physical address bits [31:12] (bits 12..=31).
    #[bits(20)]
    frame: u32,
}

impl PointerTableEntry {
    /// The 4 KiB-aligned physical address this entry points at.
    #[inline]
    #[must_use]
    pub const fn address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.frame() << Size4K::SHIFT)
    }

    /// Store `pa`, discarding its low 12 bits. Status bits are untouched.
    #[inline]
    pub const fn set_address(&mut self, pa: PhysicalAddress) {
        self.set_frame(pa.as_u32() >> Size4K::SHIFT);
    }

    /// Read status bit `bit` (`0..12`).
    #[inline]
    #[must_use]
    pub const fn status_flag(self, bit: u32) -> bool {
        debug_assert!((bit as usize) < Self::STATUS_BITS);
        self.status() & (1 << bit) != 0
    }

    /// Write status bit `bit` (`0..12`). The address and all other status
    /// bits are untouched.
    #[inline]
    pub const fn set_status_flag(&mut self, bit: u32, value: bool) {
        debug_assert!((bit as usize) < Self::STATUS_BITS);
        let mask = 1 << bit;
        let status = if value {
            self.status() | mask
        } else {
            self.status() & !mask
        };
        self.set_status(status);
    }

    /// The raw 32-bit word.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.into_bits()
    }

    /// Wrap a raw 32-bit word.
    #[inline]
    #[must_use]
    pub const fn from_value(v: u32) -> Self {
        Self::from_bits(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_truncated_to_frame() {
        let mut e = PointerTableEntry::new();
        for raw in [0u32, 0xFFF, 0x1000, 0x0012_3456, 0xFFFF_FFFF] {
            e.set_address(PhysicalAddress::new(raw));
            assert_eq!(e.address().as_u32(), raw & 0xFFFF_F000);
        }
    }

    #[test]
    fn status_bits_are_independent_of_address() {
        let mut e = PointerTableEntry::new();
        e.set_status_flag(11, true);
        e.set_status_flag(0, true);
        e.set_address(PhysicalAddress::new(0xABCD_E000));
        assert_eq!(e.value(), 0xABCD_E801);

        e.set_status_flag(11, false);
        assert!(!e.status_flag(11));
        assert!(e.status_flag(0));
        assert_eq!(e.address().as_u32(), 0xABCD_E000);
    }

    #[test]
    fn highest_status_bit_sits_below_the_frame() {
        assert_eq!(PointerTableEntry::STATUS_BITS, 12);
        let mut e = PointerTableEntry::new();
        e.set_status_flag(11, true);
        assert_eq!(e.value(), 0x800);
        assert_eq!(e.address(), PhysicalAddress::zero());
    }

    #[test]
    fn from_value_preserves_word() {
        let e = PointerTableEntry::from_value(0x0040_0063);
        assert_eq!(e.value(), 0x0040_0063);
        assert!(e.status_flag(0));
        assert!(e.status_flag(1));
        assert!(e.status_flag(5));
        assert!(e.status_flag(6));
        assert!(!e.status_flag(2));
    }
}
