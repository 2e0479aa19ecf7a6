//! # QEMU Debug Console Output
//!
//! Early-boot diagnostics for kernels running under QEMU, written to the
//! debug console I/O port `0x402`.
//!
//! ## Components
//!
//! * [`QemuLogger`]: a `log::Log` backend; install it with [`init`].
//! * [`qemu_trace!`]: `format!`-style output that bypasses the `log` facade.
//!
//! Both are no-ops when the `enabled` feature is off.
//!
//! ## Host-Side Configuration
//! ```bash
//! qemu-system-i386 -kernel kernel.elf -debugcon stdio
//! qemu-system-i386 -kernel kernel.elf -debugcon file:debug.log
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use log::{LevelFilter, info};
//!
//! kernel_qemu::init(LevelFilter::Debug).expect("logger initialization");
//! info!("Kernel subsystem initialized");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, init};

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug port.
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
            );
        }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    const unsafe fn outb(_port: u16, _val: u8) {}

    /// `fmt::Write` adapter over the debug port. Output is unbuffered.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort output; the port cannot fail.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
