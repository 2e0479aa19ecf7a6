//! # Multiboot Boot Information
//!
//! Read-only views of the records the boot loader hands to the kernel.
//! See the Multiboot 0.6.96 specification, "Boot information format".
//!
//! Records are decoded from little-endian byte slices, so callers only need
//! `unsafe` to turn a physical address into a slice, not to interpret it.

use crate::elf::ElfSectionHeaderTable;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// Validity flags of a [`MultibootInfo`] record. Each bit states which of the
/// optional fields the boot loader filled in.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MultibootFlags {
    /// `mem_lower` / `mem_upper` are valid.
    pub memory: bool,
    /// `boot_device` is valid.
    pub boot_device: bool,
    /// `cmdline` is valid.
    pub cmdline: bool,
    /// `mods_count` / `mods_addr` are valid.
    pub modules: bool,
    /// The symbol union holds an a.out symbol table.
    pub aout_symbols: bool,
    /// The symbol union holds an ELF section-header table.
    pub elf_sections: bool,
    /// `mmap_length` / `mmap_addr` are valid.
    pub memory_map: bool,
    #[bits(25)]
    __: u32,
}

/// The a.out flavour of the symbol union.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AoutSymbolTable {
    pub tabsize: u32,
    pub strsize: u32,
    pub addr: u32,
    pub reserved: u32,
}

/// The Multiboot information record.
///
/// The symbol table is a union in the boot-loader ABI; it is kept as four raw
/// words here and decoded according to [`MultibootFlags`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
    pub syms: [u32; 4],
    pub mmap_length: u32,
    pub mmap_addr: u32,
}

/// Where the boot loader put the memory map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMapLocation {
    pub addr: PhysicalAddress,
    /// Length of the map in **bytes**.
    pub length: u32,
}

impl MultibootInfo {
    /// Size of the record in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Decode a record from its in-memory representation.
    ///
    /// Returns `None` if `bytes` is shorter than [`Self::SIZE`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let word = |i: usize| read_u32(bytes, i * 4);
        Some(Self {
            flags: word(0),
            mem_lower: word(1),
            mem_upper: word(2),
            boot_device: word(3),
            cmdline: word(4),
            mods_count: word(5),
            mods_addr: word(6),
            syms: [word(7), word(8), word(9), word(10)],
            mmap_length: word(11),
            mmap_addr: word(12),
        })
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MultibootFlags {
        MultibootFlags::from_bits(self.flags)
    }

    /// The ELF section-header table, if the boot loader provided one.
    #[must_use]
    pub const fn elf_section_header_table(&self) -> Option<ElfSectionHeaderTable> {
        if !self.flags().elf_sections() {
            return None;
        }
        Some(ElfSectionHeaderTable {
            num: self.syms[0],
            size: self.syms[1],
            addr: self.syms[2],
            shndx: self.syms[3],
        })
    }

    /// The a.out symbol table, if the boot loader provided one.
    #[must_use]
    pub const fn aout_symbol_table(&self) -> Option<AoutSymbolTable> {
        if !self.flags().aout_symbols() {
            return None;
        }
        Some(AoutSymbolTable {
            tabsize: self.syms[0],
            strsize: self.syms[1],
            addr: self.syms[2],
            reserved: self.syms[3],
        })
    }

    /// The memory map, if the boot loader provided one.
    #[must_use]
    pub const fn memory_map(&self) -> Option<MemoryMapLocation> {
        if !self.flags().memory_map() {
            return None;
        }
        Some(MemoryMapLocation {
            addr: PhysicalAddress::new(self.mmap_addr),
            length: self.mmap_length,
        })
    }
}

/// Type tag of a memory-map entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryType {
    /// Usable RAM.
    Available,
    /// Reserved by firmware or hardware.
    Reserved,
    /// ACPI tables; reclaimable once they have been parsed.
    AcpiReclaimable,
    /// ACPI non-volatile storage; must be preserved.
    AcpiNvs,
    /// Defective RAM.
    BadRam,
    /// Any other (vendor-specific) type.
    Other(u32),
}

impl MemoryType {
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        match v {
            1 => Self::Available,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::BadRam,
            other => Self::Other(other),
        }
    }

    /// Whether frames in regions of this type may be handed out by the frame
    /// allocator.
    #[must_use]
    pub const fn is_allocatable(self) -> bool {
        matches!(self, Self::Available | Self::AcpiReclaimable)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::AcpiReclaimable => "ACPI reclaimable",
            Self::AcpiNvs => "ACPI NVS",
            Self::BadRam => "bad RAM",
            Self::Other(_) => "other",
        }
    }
}

/// One decoded memory-map entry.
///
/// Base and length are 64-bit in the boot-loader ABI (low/high word pairs).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryType,
}

impl MemoryMapEntry {
    /// Exclusive end address, saturating at `u64::MAX`.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

/// Iterator over the variable-stride memory-map records.
///
/// Every record starts with a `size` word that does **not** count itself; the
/// next record begins `size + 4` bytes later. Iteration stops at the end of the
/// buffer or at the first truncated record.
#[derive(Clone)]
pub struct MemoryMapIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> MemoryMapIter<'a> {
    /// Bytes of a record after its `size` word.
    const ENTRY_BODY: usize = 20;

    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl Iterator for MemoryMapIter<'_> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset;
        if self.bytes.len().saturating_sub(start) < 4 + Self::ENTRY_BODY {
            return None;
        }

        let size = read_u32(self.bytes, start) as usize;
        if size < Self::ENTRY_BODY {
            self.offset = self.bytes.len();
            return None;
        }

        let body = start + 4;
        let base = u64::from(read_u32(self.bytes, body))
            | (u64::from(read_u32(self.bytes, body + 4)) << 32);
        let length = u64::from(read_u32(self.bytes, body + 8))
            | (u64::from(read_u32(self.bytes, body + 12)) << 32);
        let kind = MemoryType::from_raw(read_u32(self.bytes, body + 16));

        self.offset = body.saturating_add(size);
        Some(MemoryMapEntry { base, length, kind })
    }
}

/// Read a little-endian word; `bytes` must hold at least `offset + 4` bytes.
#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}
