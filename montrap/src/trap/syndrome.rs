// SPDX-License-Identifier: MPL-2.0

//! Decoding of the saved exception state.

use bit_field::BitField;

use super::desc;
use crate::hw::{Machine, SysReg};

/// An exception class, `ESR_ELx.EC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExceptionClass(u8);

impl ExceptionClass {
    /// `HVC` executed in AArch64 state.
    pub const HVC64: Self = Self(0x16);
    /// Data abort taken without a change of exception level.
    pub const DATA_ABORT_CURRENT: Self = Self(0x25);
    /// `BRK` executed in AArch64 state.
    pub const BRK64: Self = Self(0x3c);

    /// Creates a class from its raw code, keeping the low 6 bits.
    pub const fn new(code: u8) -> Self {
        Self(code & 0x3f)
    }

    /// Returns the raw 6-bit code.
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Returns the human-readable description.
    pub fn description(self) -> &'static str {
        desc::class_name(self.0)
    }
}

/// An exception syndrome register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Esr(pub u64);

impl Esr {
    /// Returns the exception class.
    pub fn class(self) -> ExceptionClass {
        ExceptionClass::new(self.0.get_bits(26..32) as u8)
    }

    /// Returns the immediate of an `HVC`, `SVC`, `SMC` or `BRK`.
    pub fn imm16(self) -> u16 {
        self.0.get_bits(0..16) as u16
    }
}

/// A saved program status register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spsr(pub u64);

impl Spsr {
    /// `M[3:0]` of EL0 using `SP_EL0`.
    pub const EL0T: u8 = 0x0;
    /// `M[3:0]` of EL1 using `SP_EL1`.
    pub const EL1H: u8 = 0x5;
    /// `M[3:0]` of EL2 using `SP_EL2`.
    pub const EL2H: u8 = 0x9;

    /// Returns `M[3:0]`, the mode the exception was taken from.
    pub fn mode(self) -> u8 {
        self.0.get_bits(0..4) as u8
    }
}

/// Where the exception being handled was originally taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Taken by the current level.
    Direct,
    /// Taken by the guest at EL1 and handed over to us through a hypercall.
    /// Its state lives in the `_EL12` registers.
    ForwardedFromNested,
}

/// The exception state registers of one exception level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavedState {
    /// The saved program status.
    pub spsr: Spsr,
    /// The exception link register.
    pub elr: u64,
    /// The exception syndrome.
    pub esr: Esr,
    /// The fault address.
    pub far: u64,
}

impl SavedState {
    /// Reads the state belonging to `origin`.
    pub fn read<M: Machine>(machine: &M, origin: Origin) -> Self {
        let (spsr, elr, esr, far) = match origin {
            Origin::Direct => (
                SysReg::SpsrEl1,
                SysReg::ElrEl1,
                SysReg::EsrEl1,
                SysReg::FarEl1,
            ),
            Origin::ForwardedFromNested => (
                SysReg::SpsrEl12,
                SysReg::ElrEl12,
                SysReg::EsrEl12,
                SysReg::FarEl12,
            ),
        };
        Self {
            spsr: Spsr(machine.read(spsr)),
            elr: machine.read(elr),
            esr: Esr(machine.read(esr)),
            far: machine.read(far),
        }
    }
}
