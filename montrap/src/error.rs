// SPDX-License-Identifier: MPL-2.0

/// The error type which is returned from the APIs of this crate.
///
/// Trap handlers never return errors: a trap either resumes or ends in the
/// terminal reboot. These errors only come from the caller-facing APIs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// Invalid arguments provided.
    InvalidArgs,
    /// The current CPU has already installed its exception vectors.
    AlreadyInitialized,
    /// The global configuration has not been set up yet.
    NotInitialized,
    /// A guarded region is already active on the current CPU.
    GuardBusy,
    /// The guarded operation faulted and was recovered.
    Faulted,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidArgs => "invalid arguments",
            Error::AlreadyInitialized => "exception handling is already initialized on this CPU",
            Error::NotInitialized => "the trap configuration is not initialized",
            Error::GuardBusy => "a guarded region is already active",
            Error::Faulted => "the guarded operation faulted",
        };
        f.write_str(msg)
    }
}
