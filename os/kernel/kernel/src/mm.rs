//! Kernel memory bring-up.

use crate::tracing::{log_boot_info, log_elf_sections, log_memory_map};
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_alloc::{KernelVmm, PageFrameManager, usable_regions};
use kernel_info::boot::{MemoryMapIter, MultibootInfo};
use kernel_info::elf::{ElfSectionHeaderTable, SectionHeaders, SectionType, StringTable};
use kernel_info::memory::FRAME_TABLE_CAPACITY;
use kernel_memory_addresses::PhysicalAddress;
use kernel_registers::cr3::Cr3;
use kernel_vmem::{FrameTableEntry, HigherHalfMapper, KernelAddressSpace, PhysMapper};
use log::{Level, info, log_enabled};

/// The kernel's virtual memory manager over the page frame manager.
pub type KernelMemory<'a> = KernelVmm<'a, PageFrameManager<'a>>;

static mut KERNEL_ADDRESS_SPACE: KernelAddressSpace = KernelAddressSpace::zeroed();

static mut FRAME_TABLE: [FrameTableEntry; FRAME_TABLE_CAPACITY] =
    [FrameTableEntry::zero(); FRAME_TABLE_CAPACITY];

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Bring up kernel memory management using the statically allocated kernel
/// page tables and frame table.
///
/// # Safety
/// - `boot_info` must be the physical address of the Multiboot information
///   record passed by the boot loader.
/// - The boot page tables must map the low MiB and the kernel image at
///   `KERNEL_BASE`, and the boot records must live in that window.
///
/// # Panics
/// When called more than once, or on any inconsistency in the boot data.
pub unsafe fn init_kernel_memory(boot_info: PhysicalAddress) -> KernelMemory<'static> {
    assert!(
        !INITIALIZED.swap(true, Ordering::AcqRel),
        "kernel memory initialized twice"
    );

    #[cfg(feature = "qemu")]
    {
        if let Err(err) = kernel_qemu::init(crate::KERNEL_LOG_LEVEL) {
            log::warn!("QEMU logger not installed: {err}");
        }
    }

    let mapper = HigherHalfMapper;
    let info_bytes = unsafe { phys_bytes(&mapper, boot_info, MultibootInfo::SIZE) };
    let Some(info) = MultibootInfo::from_bytes(info_bytes) else {
        unreachable!("the record slice has exactly MultibootInfo::SIZE bytes");
    };

    // SAFETY: INITIALIZED hands out these borrows exactly once.
    let space = unsafe { &mut *(&raw mut KERNEL_ADDRESS_SPACE) };
    let frames = unsafe { &mut *(&raw mut FRAME_TABLE) };

    unsafe { bootstrap(&mapper, &info, space, frames, load_page_directory) }
}

fn load_page_directory(cr3: Cr3) {
    #[cfg(target_arch = "x86")]
    {
        use kernel_registers::StoreRegisterUnsafe;
        // SAFETY: the new directory maps the running kernel image at the same
        // addresses as the boot page tables.
        unsafe { cr3.store_unsafe() };
    }
    #[cfg(not(target_arch = "x86"))]
    let _ = cr3;
    info!("Kernel page directory loaded");
}

/// Build the kernel address space, initialize the frame allocator and
/// reconcile the two.
///
/// `load_directory` receives the CR3 value of the new page directory once the
/// address space is built and must activate it. Boot records are read before
/// it runs.
///
/// # Safety
/// Every physical address in `boot_info` (ELF section headers, string table,
/// memory map) must be readable through `mapper`, and `mapper` must translate
/// pointers into `space` to their physical addresses.
///
/// # Panics
/// If the boot loader provided no ELF section headers or no memory map, if
/// the section headers are not ELF32, or on any fatal allocator condition.
pub unsafe fn bootstrap<'a, M, F>(
    mapper: &M,
    boot_info: &MultibootInfo,
    space: &'a mut KernelAddressSpace,
    frame_storage: &'a mut [FrameTableEntry],
    load_directory: F,
) -> KernelMemory<'a>
where
    M: PhysMapper,
    F: FnOnce(Cr3),
{
    info!("Initializing kernel memory");
    log_boot_info(boot_info);

    let Some(elf) = boot_info.elf_section_header_table() else {
        panic!("boot loader did not provide the kernel ELF section headers");
    };
    assert!(
        elf.has_elf32_headers(),
        "unexpected ELF section header size {}",
        elf.size
    );
    let Some(mmap) = boot_info.memory_map() else {
        panic!("boot loader did not provide a memory map");
    };

    let headers = unsafe { phys_bytes(mapper, PhysicalAddress::new(elf.addr), elf.byte_len()) };
    let names = unsafe { section_names(mapper, &elf, headers) };
    log_elf_sections(SectionHeaders::new(headers), names);

    info!("Initializing kernel page directory");
    let cr3 = space.build(mapper, SectionHeaders::new(headers));
    if log_enabled!(Level::Trace) {
        space.dump();
    }

    let map = unsafe { phys_bytes(mapper, mmap.addr, mmap.length as usize) };
    log_memory_map(MemoryMapIter::new(map));
    let regions = usable_regions(MemoryMapIter::new(map));
    info!("Found {} usable memory regions", regions.len());

    load_directory(cr3);

    let mut frames = PageFrameManager::new(frame_storage);
    frames.initialize(&regions);
    info!("Page frame manager holds {} frames", frames.num_frames());

    let mut vmm = KernelVmm::new(space, frames);
    vmm.synchronize();
    vmm
}

/// The section-name string table, if the boot loader loaded it.
///
/// # Safety
/// See [`bootstrap`].
unsafe fn section_names<'b, M: PhysMapper>(
    mapper: &M,
    elf: &ElfSectionHeaderTable,
    headers: &[u8],
) -> Option<StringTable<'b>> {
    let header = SectionHeaders::new(headers).nth(elf.shndx as usize)?;
    if header.section_type() != SectionType::StrTab || header.addr == 0 {
        return None;
    }
    let bytes = unsafe { phys_bytes(mapper, header.physical_address(), header.size as usize) };
    StringTable::new(bytes)
}

/// View `len` bytes of physical memory at `pa`.
///
/// # Safety
/// The range must be readable through `mapper` and must not change for `'b`.
unsafe fn phys_bytes<'b, M: PhysMapper>(mapper: &M, pa: PhysicalAddress, len: usize) -> &'b [u8] {
    let ptr = mapper.phys_to_ptr::<u8>(pa);
    unsafe { core::slice::from_raw_parts(ptr.cast_const(), len) }
}
