pointer_table_entry! {
    /// One slot of the physical frame allocator's table: the frame's base
    /// address and whether it has been handed out.
    pub struct FrameTableEntry {
        /// The frame is allocated or reserved.
        0 => in_use / set_in_use / with_in_use,
    }
}

impl FrameTableEntry {
    /// A free entry for the frame at `pa`.
    #[inline]
    #[must_use]
    pub const fn free(pa: kernel_memory_addresses::PhysicalAddress) -> Self {
        Self::zero().with_address(pa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn in_use_is_bit_zero() {
        let mut e = FrameTableEntry::free(PhysicalAddress::new(0x7000));
        assert!(!e.in_use());
        e.set_in_use(true);
        assert_eq!(e.value(), 0x7001);
        assert_eq!(e.address(), PhysicalAddress::new(0x7000));
    }
}
