// SPDX-License-Identifier: MPL-2.0

//! The hardware capabilities consumed by the trap handlers.
//!
//! The handlers never touch the processor directly. Everything they need,
//! system registers, barriers, a raw memory read and the terminal reboot, is
//! reached through [`Machine`], so that the bare-metal backend in
//! [`crate::arch`] and a host-side mock can be swapped freely.

mod source;

use bitflags::bitflags;

pub use self::source::{GenericTimer, InterruptSource, PmcOverflow, UncorePmcOverflow};

/// The system registers that the trap layer reads or writes.
///
/// With `HCR_EL2.E2H` set, the `*_EL1` names used from EL2 access the EL2
/// registers, and the `*_EL12`/`*_EL02` names access the registers of a
/// guest running at EL1. The `Apl*` registers are implementation defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[expect(missing_docs)]
pub enum SysReg {
    CurrentEl,
    Daif,
    MpidrEl1,
    VbarEl1,
    VbarEl12,
    HcrEl2,
    SpsrEl1,
    SpsrEl12,
    SpsrEl2,
    ElrEl1,
    ElrEl12,
    ElrEl2,
    EsrEl1,
    EsrEl12,
    EsrEl2,
    FarEl1,
    FarEl12,
    CntpCtlEl0,
    CntvCtlEl0,
    CntpCtlEl02,
    CntvCtlEl02,
    AplGxfStatusEl1,
    AplAspsrGl1,
    AplL2cErrSts,
    AplL2cErrAdr,
    AplL2cErrInf,
    AplLsuErrSts,
    AplFedErrSts,
    AplMmuErrSts,
    AplELsuErrSts,
    AplEFedErrSts,
    AplEMmuErrSts,
    AplPmcr0,
    AplUpmcr0,
    AplUpmsr,
}

/// A memory or instruction barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Barrier {
    /// `isb`
    Isb,
    /// `dsb sy`
    DsbSy,
}

bitflags! {
    /// The interrupt mask bits of `DAIF`.
    pub struct Daif: u64 {
        /// Debug exceptions.
        const D = 1 << 9;
        /// SError interrupts.
        const A = 1 << 8;
        /// IRQs.
        const I = 1 << 7;
        /// FIQs.
        const F = 1 << 6;
    }
}

bitflags! {
    /// The `HCR_EL2` bits programmed when the monitor runs at EL2.
    pub struct HcrFlags: u64 {
        /// Do not trap pointer authentication instructions.
        const API = 1 << 41;
        /// Do not trap pointer authentication key accesses.
        const APK = 1 << 40;
        /// Route synchronous external aborts to EL2.
        const TEA = 1 << 37;
        /// Enable the virtualization host extensions.
        const E2H = 1 << 34;
        /// EL1 is AArch64.
        const RW = 1 << 31;
        /// Trap general exceptions from EL0 to EL2.
        const TGE = 1 << 27;
        /// Route SErrors to EL2.
        const AMO = 1 << 5;
        /// Route IRQs to EL2.
        const IMO = 1 << 4;
        /// Route FIQs to EL2.
        const FMO = 1 << 3;
    }
}

impl HcrFlags {
    /// The configuration used while hosting a guest at EL1.
    pub const fn host_default() -> Self {
        Self::from_bits_truncate(
            Self::API.bits()
                | Self::APK.bits()
                | Self::TEA.bits()
                | Self::E2H.bits()
                | Self::RW.bits()
                | Self::TGE.bits()
                | Self::AMO.bits()
                | Self::IMO.bits()
                | Self::FMO.bits(),
        )
    }
}

/// The value of `CurrentEL` while running at EL1.
pub const CURRENT_EL1: u64 = 0x04;
/// The value of `CurrentEL` while running at EL2.
pub const CURRENT_EL2: u64 = 0x08;

/// Access to the processor state the trap layer works on.
///
/// Methods take `&self` since the state lives in the hardware, not in the
/// implementor.
pub trait Machine {
    /// Reads a system register.
    fn read(&self, reg: SysReg) -> u64;

    /// Writes a system register.
    fn write(&self, reg: SysReg, value: u64);

    /// Issues a barrier.
    fn barrier(&self, barrier: Barrier);

    /// Reads a 32-bit word from memory.
    ///
    /// # Safety
    ///
    /// `addr` must be mapped and readable as a naturally aligned `u32`.
    unsafe fn read_u32(&self, addr: u64) -> u32;

    /// Flushes the console and reboots. This never returns.
    fn flush_and_reboot(&self) -> !;

    /// Clears the bits of `mask` in a system register.
    fn clear_bits(&self, reg: SysReg, mask: u64) {
        let value = self.read(reg);
        self.write(reg, value & !mask);
    }

    /// Issues `isb` followed by `dsb sy`.
    fn sync_barriers(&self) {
        self.barrier(Barrier::Isb);
        self.barrier(Barrier::DsbSy);
    }

    /// Returns whether the monitor runs at EL2, i.e. hosts a guest level.
    fn in_el2(&self) -> bool {
        self.read(SysReg::CurrentEl) == CURRENT_EL2
    }

    /// Returns whether the CPU is executing in a guarded level (GL1/GL2).
    fn in_gl12(&self) -> bool {
        self.read(SysReg::AplGxfStatusEl1) & 1 != 0
    }

    /// Returns whether the current CPU is an efficiency core.
    ///
    /// Performance cores report bit 16 of `MPIDR_EL1` set.
    fn is_ecore(&self) -> bool {
        self.read(SysReg::MpidrEl1) & (1 << 16) == 0
    }
}
