use crate::qemu_trace;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing one line per record to the QEMU debug console.
///
/// Filtering follows the global `log::max_level()`, set by [`init`].
pub struct QemuLogger;

static LOGGER: QemuLogger = QemuLogger;

/// Install the [`QemuLogger`] and set the global level filter.
///
/// Call this once during early init.
///
/// # Errors
/// If a logger has already been installed.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}

impl QemuLogger {
    /// Format: `[LEVEL] target: message`
    fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
        writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = Self::write_record(&mut TraceWriter, record);
    }

    fn flush(&self) {
        // no-op for qemu debug port
    }
}

/// Routes formatted output through [`qemu_trace!`].
struct TraceWriter;

impl Write for TraceWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        qemu_trace!("{s}");
        Ok(())
    }
}
