//! # Kernel Tracing helpers

use kernel_info::boot::{MemoryMapIter, MultibootInfo};
use kernel_info::elf::{SectionHeaders, StringTable};
use log::{debug, info};

pub fn log_boot_info(boot_info: &MultibootInfo) {
    info!(
        concat!(
            "Multiboot info:\n",
            "  flags    = {flags:#010x}\n",
            "  memory   = {lower} KiB lower, {upper} KiB upper\n",
            "  mmap     = {mmap_addr:#010x}, len = {mmap_len}\n",
            "  ELF shdr = {shdr_addr:#010x}, num = {shdr_num}, size = {shdr_size}, shndx = {shndx}"
        ),
        flags = boot_info.flags,
        lower = boot_info.mem_lower,
        upper = boot_info.mem_upper,
        mmap_addr = boot_info.mmap_addr,
        mmap_len = boot_info.mmap_length,
        shdr_num = boot_info.syms[0],
        shdr_size = boot_info.syms[1],
        shdr_addr = boot_info.syms[2],
        shndx = boot_info.syms[3],
    );
}

pub fn log_memory_map(entries: MemoryMapIter) {
    info!("Memory map:");
    for entry in entries {
        info!(
            "  {:#011x}..{:#011x} {:>9} KiB  {}",
            entry.base,
            entry.end(),
            entry.length / 1024,
            entry.kind.as_str()
        );
    }
}

pub fn log_elf_sections(headers: SectionHeaders, names: Option<StringTable>) {
    debug!("Kernel ELF sections:");
    for (index, header) in headers.enumerate() {
        let name = names.and_then(|t| t.get(header.name)).unwrap_or("?");
        let flags = header.section_flags();
        debug!(
            "  [{index:2}] {name:<20} {:<13} {:#010x} {:#9x} {}{}{}",
            header.section_type().as_str(),
            header.addr,
            header.size,
            if flags.write() { 'W' } else { '-' },
            if flags.alloc() { 'A' } else { '-' },
            if flags.exec_instr() { 'X' } else { '-' },
        );
    }
}
