// SPDX-License-Identifier: MPL-2.0

//! The console that trap diagnostics and logs are printed to.
//!
//! The monitor owns the UART. It hands this crate a [`Console`] once with
//! [`inject`]; output produced before that is dropped.

use core::fmt::{self, Arguments, Write};

use spin::Once;

/// An output device for diagnostics.
pub trait Console: Sync {
    /// Writes a string.
    fn write_str(&self, s: &str);

    /// Waits until all written output has left the device.
    fn flush(&self) {}
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

/// Injects the console. Only the first call has an effect.
pub fn inject(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
}

/// Flushes the injected console, if any.
pub fn flush() {
    if let Some(console) = CONSOLE.get() {
        console.flush();
    }
}

/// A [`fmt::Write`] sink backed by the injected console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(console) = CONSOLE.get() {
            console.write_str(s);
        }
        Ok(())
    }
}

/// Prints formatted arguments to the console.
pub fn print(args: Arguments) {
    // Writing to the console cannot fail.
    let _ = ConsoleWriter.write_fmt(args);
}

/// Prints to the console.
#[macro_export]
macro_rules! early_print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!($fmt $(, $($arg)+)?))
    }
}

/// Prints to the console, with a newline.
#[macro_export]
macro_rules! early_println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?))
    }
}
