// SPDX-License-Identifier: MPL-2.0

//! Trap handling for a bare-metal AArch64 monitor.
//!
//! This crate classifies every hardware trap taken by the monitor
//! (synchronous exceptions, IRQs, FIQs and SErrors), recognizes the
//! cooperative returns used to come back from lower exception levels,
//! re-dispatches exceptions forwarded by a guest running at EL1 under our
//! EL2, and offers _guarded probes_: a caller may arm a per-core [`Guard`]
//! so that a fault caused by the next instruction is turned into a
//! controlled resumption instead of a reboot.
//!
//! All hardware access goes through the [`Machine`] capability. On the real
//! target it is backed by `mrs`/`msr` (see [`arch`]); in host unit tests it is
//! a mock, which is why the crate is only `no_std` outside of `cfg(test)`.
//!
//! [`Guard`]: trap::Guard
//! [`Machine`]: hw::Machine

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod arch;
pub mod config;
pub mod console;
pub mod cpu;
mod error;
pub mod hw;
pub mod logger;
pub mod prelude;
pub mod trap;

pub use self::{config::TrapConfig, error::Error, prelude::Result};

/// Sets up the console, the logger and the configuration shared by all
/// CPUs.
///
/// Only the first call takes effect, apart from the log level.
pub fn init(console: &'static dyn console::Console, config: TrapConfig) -> &'static TrapConfig {
    console::inject(console);
    logger::init(config.log_level);
    config::init(config)
}
