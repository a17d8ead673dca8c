// SPDX-License-Identifier: MPL-2.0

//! Logging support.
//!
//! The logger prints the logs to the injected console. Messages are always
//! printed in their entirety without being mixed with messages generated
//! concurrently on other cores.
//!
//! Trap diagnostics do not go through here: they are printed directly so
//! that a silent guard can suppress them regardless of the log level.

use log::{LevelFilter, Metadata, Record};
use spin::Mutex;

use crate::early_println;

static LOGGER: Logger = Logger;

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Use a global lock to prevent interleaving of log messages.
        static RECORD_LOCK: Mutex<()> = Mutex::new(());
        let _lock = RECORD_LOCK.lock();

        early_println!("{:<5}: {}", record.level(), record.args());
    }

    fn flush(&self) {
        crate::console::flush();
    }
}

/// Initializes the logger with the maximum level `level`.
///
/// Users should avoid using the log macros before this function is called.
/// Calling it again only changes the level.
pub fn init(level: LevelFilter) {
    log::set_max_level(level);
    // Another logger may already be installed; leveling still applies.
    let _ = log::set_logger(&LOGGER);
}
