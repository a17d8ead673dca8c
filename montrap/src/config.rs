// SPDX-License-Identifier: MPL-2.0

//! The configuration of the trap layer.
//!
//! Addresses of the pieces provided by the surrounding monitor (vector
//! tables, return stubs, device registers) are collected in a [`TrapConfig`],
//! together with the runtime policies. The policies may be overridden from
//! the boot command line with `montrap.<key>=<value>` arguments:
//!
//! - `montrap.log_level=off|error|warn|info|debug|trace`
//! - `montrap.serror=report|fatal`
//! - `montrap.uart_debug=<hex address>|off`

use log::LevelFilter;
use spin::Once;

use crate::{prelude::*, Error};

/// The command-line prefix of our module arguments.
const MODULE_PREFIX: &str = "montrap.";

/// What happens after an SError has been reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SErrorPolicy {
    /// Report the SError and resume the interrupted context.
    #[default]
    Report,
    /// Report the SError and reboot.
    Fatal,
}

/// The configuration of the trap layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapConfig {
    /// The vector table of the current level (`VBAR_EL1`).
    pub vectors: u64,
    /// The vector table installed for a guest at EL1 (`VBAR_EL12`).
    pub guest_vectors: u64,
    /// The stub that cooperative returns from EL0 resume at.
    pub el0_return: u64,
    /// The stub that cooperative returns from EL1 resume at.
    pub el1_return: u64,
    /// The load address of the monitor image, for relative PCs in reports.
    pub image_base: u64,
    /// The interrupt controller word holding the type and number of the
    /// pending IRQ.
    pub irq_event: u64,
    /// The base of a UART whose status is dumped on every IRQ.
    pub uart_debug: Option<u64>,
    /// The SError policy.
    pub serror: SErrorPolicy,
    /// The maximum log level.
    pub log_level: LevelFilter,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            vectors: 0,
            guest_vectors: 0,
            el0_return: 0,
            el1_return: 0,
            image_base: 0,
            irq_event: 0x23b10_2004,
            uart_debug: None,
            serror: SErrorPolicy::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl TrapConfig {
    /// Sets the vector tables.
    pub fn with_vectors(mut self, vectors: u64, guest_vectors: u64) -> Self {
        self.vectors = vectors;
        self.guest_vectors = guest_vectors;
        self
    }

    /// Sets the cooperative return stubs.
    pub fn with_return_stubs(mut self, el0_return: u64, el1_return: u64) -> Self {
        self.el0_return = el0_return;
        self.el1_return = el1_return;
        self
    }

    /// Sets the image base.
    pub fn with_image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    /// Sets the SError policy.
    pub fn with_serror(mut self, policy: SErrorPolicy) -> Self {
        self.serror = policy;
        self
    }

    /// Applies the `montrap.*` arguments of a boot command line.
    ///
    /// Arguments of other modules and plain words are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgs` for an unknown `montrap.*` key or a value
    /// that does not parse. The configuration is left untouched then.
    pub fn parse_cmdline(mut self, cmdline: &str) -> Result<Self> {
        for arg in cmdline.split_whitespace() {
            let Some(arg) = arg.strip_prefix(MODULE_PREFIX) else {
                continue;
            };
            let (key, value) = arg.split_once('=').ok_or(Error::InvalidArgs)?;
            match key {
                "log_level" => self.log_level = parse_log_level(value)?,
                "serror" => {
                    self.serror = match value {
                        "report" => SErrorPolicy::Report,
                        "fatal" => SErrorPolicy::Fatal,
                        _ => return Err(Error::InvalidArgs),
                    }
                }
                "uart_debug" => {
                    self.uart_debug = match value {
                        "off" => None,
                        _ => Some(parse_hex(value)?),
                    }
                }
                _ => return Err(Error::InvalidArgs),
            }
        }
        Ok(self)
    }
}

fn parse_log_level(value: &str) -> Result<LevelFilter> {
    Ok(match value {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => return Err(Error::InvalidArgs),
    })
}

fn parse_hex(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|_| Error::InvalidArgs)
}

static CONFIG: Once<TrapConfig> = Once::new();

/// Sets the process-wide configuration. Only the first call has an effect.
pub fn init(config: TrapConfig) -> &'static TrapConfig {
    CONFIG.call_once(|| config)
}

/// Returns the process-wide configuration.
///
/// # Errors
///
/// Returns `Error::NotInitialized` before [`init`] has been called.
pub fn get() -> Result<&'static TrapConfig> {
    CONFIG.get().ok_or(Error::NotInitialized)
}
