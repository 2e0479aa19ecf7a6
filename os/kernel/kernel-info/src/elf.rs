//! # ELF32 Section Headers
//!
//! The boot loader passes the kernel's own section-header table; the kernel
//! uses it to learn where each loaded section lives and whether it is
//! writable. Only the 32-bit little-endian layout is modelled.
//!
//! Try `readelf --sections kernel.elf` to see what the table looks like.

use crate::boot::read_u32;
use crate::memory::{is_kernel_space, kernel_virt_to_phys};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Size of one ELF32 section header in bytes.
pub const ELF32_SECTION_HEADER_SIZE: u32 = 40;

/// Location of the section-header table as reported by the boot loader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElfSectionHeaderTable {
    /// Number of section headers.
    pub num: u32,
    /// Size of each header; must equal [`ELF32_SECTION_HEADER_SIZE`].
    pub size: u32,
    /// Physical address of the first header.
    pub addr: u32,
    /// Index of the section-name string table.
    pub shndx: u32,
}

impl ElfSectionHeaderTable {
    /// Whether the header records have the expected ELF32 size.
    #[inline]
    #[must_use]
    pub const fn has_elf32_headers(&self) -> bool {
        self.size == ELF32_SECTION_HEADER_SIZE
    }

    /// Total size of the table in bytes.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.num as usize * self.size as usize
    }
}

/// Section attribute flags (`sh_flags`).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct SectionFlags {
    /// `SHF_WRITE`: writable at run time.
    pub write: bool,
    /// `SHF_ALLOC`: occupies memory during execution.
    pub alloc: bool,
    /// `SHF_EXECINSTR`: contains executable instructions.
    pub exec_instr: bool,
    #[bits(29)]
    __: u32,
}

/// Section type (`sh_type`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionType {
    Null,
    ProgBits,
    SymTab,
    StrTab,
    Rela,
    Hash,
    Dynamic,
    Note,
    NoBits,
    Rel,
    ShLib,
    DynSym,
    InitArray,
    FiniArray,
    PreInitArray,
    Group,
    SymTabShndx,
    /// Processor-specific range `0x7000_0000..=0x7FFF_FFFF`.
    Processor(u32),
    /// Application-specific range `0x8000_0000..=0xFFFF_FFFF`.
    User(u32),
    Unknown(u32),
}

impl SectionType {
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        match v {
            0 => Self::Null,
            1 => Self::ProgBits,
            2 => Self::SymTab,
            3 => Self::StrTab,
            4 => Self::Rela,
            5 => Self::Hash,
            6 => Self::Dynamic,
            7 => Self::Note,
            8 => Self::NoBits,
            9 => Self::Rel,
            10 => Self::ShLib,
            11 => Self::DynSym,
            14 => Self::InitArray,
            15 => Self::FiniArray,
            16 => Self::PreInitArray,
            17 => Self::Group,
            18 => Self::SymTabShndx,
            0x7000_0000..=0x7FFF_FFFF => Self::Processor(v),
            0x8000_0000..=0xFFFF_FFFF => Self::User(v),
            _ => Self::Unknown(v),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::ProgBits => "PROGBITS",
            Self::SymTab => "SYMTAB",
            Self::StrTab => "STRTAB",
            Self::Rela => "RELA",
            Self::Hash => "HASH",
            Self::Dynamic => "DYNAMIC",
            Self::Note => "NOTE",
            Self::NoBits => "NOBITS",
            Self::Rel => "REL",
            Self::ShLib => "SHLIB",
            Self::DynSym => "DYNSYM",
            Self::InitArray => "INIT_ARRAY",
            Self::FiniArray => "FINI_ARRAY",
            Self::PreInitArray => "PREINIT_ARRAY",
            Self::Group => "GROUP",
            Self::SymTabShndx => "SYMTAB_SHNDX",
            Self::Processor(_) => "LOPROC+",
            Self::User(_) => "LOUSER+",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// One ELF32 section header.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct Elf32SectionHeader {
    /// Section name (offset into the section-name string table).
    pub name: u32,
    /// Section type, see [`SectionType`].
    pub kind: u32,
    /// Section flags, see [`SectionFlags`].
    pub flags: u32,
    /// Address of the section in memory.
    pub addr: u32,
    /// File offset of the section data.
    pub offset: u32,
    /// Size of the section in bytes.
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub addralign: u32,
    pub entsize: u32,
}

const _: () = assert!(size_of::<Elf32SectionHeader>() == ELF32_SECTION_HEADER_SIZE as usize);

impl Elf32SectionHeader {
    /// Decode a header; `bytes` must hold at least [`ELF32_SECTION_HEADER_SIZE`] bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ELF32_SECTION_HEADER_SIZE as usize {
            return None;
        }
        let word = |i: usize| read_u32(bytes, i * 4);
        Some(Self {
            name: word(0),
            kind: word(1),
            flags: word(2),
            addr: word(3),
            offset: word(4),
            size: word(5),
            link: word(6),
            info: word(7),
            addralign: word(8),
            entsize: word(9),
        })
    }

    #[inline]
    #[must_use]
    pub const fn section_type(&self) -> SectionType {
        SectionType::from_raw(self.kind)
    }

    #[inline]
    #[must_use]
    pub const fn section_flags(&self) -> SectionFlags {
        SectionFlags::from_bits(self.flags)
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.section_flags().write()
    }

    /// Where the section lives in physical memory.
    ///
    /// The kernel is linked at [`KERNEL_BASE`](crate::memory::KERNEL_BASE) but
    /// loaded at its physical address, so higher-half section addresses are
    /// translated back; any other address is already physical.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        if is_kernel_space(self.addr) {
            kernel_virt_to_phys(VirtualAddress::new(self.addr))
        } else {
            PhysicalAddress::new(self.addr)
        }
    }
}

/// Iterator over a raw section-header table.
#[derive(Clone)]
pub struct SectionHeaders<'a> {
    chunks: core::slice::ChunksExact<'a, u8>,
}

impl<'a> SectionHeaders<'a> {
    /// Iterate the ELF32 headers in `bytes`. Trailing bytes that do not form a
    /// complete header are ignored.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            chunks: bytes.chunks_exact(ELF32_SECTION_HEADER_SIZE as usize),
        }
    }
}

impl Iterator for SectionHeaders<'_> {
    type Item = Elf32SectionHeader;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().and_then(Elf32SectionHeader::from_bytes)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for SectionHeaders<'_> {}

/// A section-name string table (`.shstrtab`).
#[derive(Copy, Clone)]
pub struct StringTable<'a> {
    bytes: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Wrap the contents of a string-table section.
    ///
    /// Returns `None` unless the table both starts and ends with a NUL byte,
    /// as ELF requires.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        match (bytes.first(), bytes.last()) {
            (Some(0), Some(0)) => Some(Self { bytes }),
            _ => None,
        }
    }

    /// The NUL-terminated string starting at `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&'a str> {
        let tail = self.bytes.get(index as usize..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&tail[..end]).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(h: &Elf32SectionHeader) -> Vec<u8> {
        [
            h.name, h.kind, h.flags, h.addr, h.offset, h.size, h.link, h.info, h.addralign,
            h.entsize,
        ]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
    }

    #[test]
    fn headers_decode_in_order() {
        let text = Elf32SectionHeader {
            name: 1,
            kind: 1,
            flags: 0b110,
            addr: 0xC010_0000,
            offset: 0x1000,
            size: 0x2345,
            link: 0,
            info: 0,
            addralign: 16,
            entsize: 0,
        };
        let data = Elf32SectionHeader {
            name: 7,
            flags: 0b011,
            addr: 0xC010_3000,
            size: 0x10,
            ..text
        };
        let mut bytes = header_bytes(&text);
        bytes.extend(header_bytes(&data));
        bytes.extend([0u8; 7]);

        let headers: Vec<_> = SectionHeaders::new(&bytes).collect();
        assert_eq!(headers, [text, data]);
        assert!(!headers[0].is_writable());
        assert!(headers[0].section_flags().exec_instr());
        assert!(headers[1].is_writable());
        assert_eq!(headers[1].section_type(), SectionType::ProgBits);
        assert_eq!(headers[1].physical_address(), PhysicalAddress::new(0x0010_3000));

        let loaded_low = Elf32SectionHeader { addr: 0x9800, ..data };
        assert_eq!(loaded_low.physical_address(), PhysicalAddress::new(0x9800));
    }

    #[test]
    fn section_type_names() {
        assert_eq!(SectionType::from_raw(8).as_str(), "NOBITS");
        assert_eq!(SectionType::from_raw(14), SectionType::InitArray);
        assert_eq!(SectionType::from_raw(0x7000_0003), SectionType::Processor(0x7000_0003));
        assert_eq!(SectionType::from_raw(40), SectionType::Unknown(40));
    }

    #[test]
    fn string_table_lookup() {
        let table = StringTable::new(b"\0.text\0.data\0").unwrap();
        assert_eq!(table.get(1), Some(".text"));
        assert_eq!(table.get(7), Some(".data"));
        assert_eq!(table.get(0), Some(""));
        assert_eq!(table.get(64), None);
    }

    #[test]
    fn string_table_requires_nul_bounds() {
        assert!(StringTable::new(b".text\0").is_none());
        assert!(StringTable::new(b"\0.text").is_none());
        assert!(StringTable::new(b"").is_none());
    }

    #[test]
    fn header_table_size_check() {
        let table = ElfSectionHeaderTable {
            num: 3,
            size: 40,
            addr: 0,
            shndx: 2,
        };
        assert!(table.has_elf32_headers());
        assert_eq!(table.byte_len(), 120);
        assert!(!ElfSectionHeaderTable { size: 64, ..table }.has_elf32_headers());
    }
}
