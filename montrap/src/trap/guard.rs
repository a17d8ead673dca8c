// SPDX-License-Identifier: MPL-2.0

//! The recovery policy applied to synchronous faults.
//!
//! A caller that wants to execute a possibly faulting instruction arms a
//! [`Guard`] on its CPU first. If the instruction faults, the synchronous
//! handler consults the guard to decide where to resume, and bumps the
//! per-CPU fault counter so that the caller can tell that it happened.

use bitflags::bitflags;

use super::frame::TrapFrame;
use crate::{cpu::CpuTrapState, hw::Machine};

/// The value written into registers whose content was lost to a guarded
/// fault.
pub const POISON: u64 = 0xacce5515abad1dea;

/// The size of an AArch64 instruction.
const INSN_SIZE: u64 = 4;

/// How a guarded fault is resumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GuardKind {
    /// No guard. Faults are fatal.
    Off = 0,
    /// Resume at the next instruction.
    Skip = 1,
    /// Resume at the next instruction and poison its destination register.
    Mark = 2,
    /// Return from the guarded function with `x0` poisoned. One-shot.
    Return = 3,
}

bitflags! {
    /// Modifiers of a [`Guard`].
    pub struct GuardFlags: u32 {
        /// Produce no diagnostics for the fault.
        const SILENT = 1 << 8;
    }
}

const KIND_MASK: u32 = 0xff;

/// A guard kind together with its modifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guard {
    kind: GuardKind,
    flags: GuardFlags,
}

impl Guard {
    /// No guard.
    pub const OFF: Self = Self::new(GuardKind::Off);
    /// See [`GuardKind::Skip`].
    pub const SKIP: Self = Self::new(GuardKind::Skip);
    /// See [`GuardKind::Mark`].
    pub const MARK: Self = Self::new(GuardKind::Mark);
    /// See [`GuardKind::Return`].
    pub const RETURN: Self = Self::new(GuardKind::Return);

    /// Creates a guard without modifiers.
    pub const fn new(kind: GuardKind) -> Self {
        Self {
            kind,
            flags: GuardFlags::empty(),
        }
    }

    /// Returns the same guard with diagnostics suppressed.
    pub const fn silent(self) -> Self {
        Self {
            kind: self.kind,
            flags: GuardFlags::from_bits_truncate(self.flags.bits() | GuardFlags::SILENT.bits()),
        }
    }

    /// Returns the guard kind.
    pub const fn kind(self) -> GuardKind {
        self.kind
    }

    /// Returns whether diagnostics are suppressed.
    pub const fn is_silent(self) -> bool {
        self.flags.contains(GuardFlags::SILENT)
    }

    /// Returns whether the guard is armed.
    pub fn is_armed(self) -> bool {
        self.kind != GuardKind::Off
    }

    /// Packs the guard into a word.
    pub const fn to_bits(self) -> u32 {
        self.kind as u32 | self.flags.bits()
    }

    /// Unpacks a guard. Unknown kinds decode as [`GuardKind::Off`].
    pub const fn from_bits(bits: u32) -> Self {
        let kind = match bits & KIND_MASK {
            1 => GuardKind::Skip,
            2 => GuardKind::Mark,
            3 => GuardKind::Return,
            _ => GuardKind::Off,
        };
        Self {
            kind,
            flags: GuardFlags::from_bits_truncate(bits),
        }
    }
}

/// The outcome of consulting the guard for a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Resume execution at the address.
    Resume(u64),
    /// The fault cannot be recovered.
    Unrecoverable,
}

/// Applies the guard of `state` to a fault at `elr`.
///
/// This may modify `frame` and, for [`GuardKind::Return`], disarms the guard.
/// The fault counter is left to the caller.
pub(crate) fn resolve<M: Machine>(
    machine: &M,
    state: &CpuTrapState,
    frame: &mut TrapFrame,
    elr: u64,
) -> Resolution {
    match state.guard().kind() {
        GuardKind::Off => Resolution::Unrecoverable,
        GuardKind::Skip => Resolution::Resume(elr.wrapping_add(INSN_SIZE)),
        GuardKind::Mark => {
            // Guarded instructions are loads or stores, which keep the
            // destination or source register in `Rt`, bits [4:0].
            //
            // SAFETY: `elr` points to the instruction that just faulted, so
            // it is mapped and 4-byte aligned.
            let insn = unsafe { machine.read_u32(elr) };
            frame.set_reg((insn & 0x1f) as usize, POISON);
            Resolution::Resume(elr.wrapping_add(INSN_SIZE))
        }
        GuardKind::Return => {
            frame.x[0] = POISON;
            state.set_guard(Guard::OFF);
            Resolution::Resume(frame.lr())
        }
    }
}
