// SPDX-License-Identifier: MPL-2.0

//! Interrupt sources multiplexed onto the FIQ vector.

use bit_field::BitField;
use bitflags::bitflags;

use super::{Machine, SysReg};

/// A hardware interrupt source that can be checked and silenced.
///
/// Masking must stop the source from re-firing as soon as the handler
/// returns, without acknowledging whatever condition raised it.
pub trait InterruptSource {
    /// Returns the name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns whether the source is currently asserting its interrupt.
    fn is_pending(&self) -> bool;

    /// Masks the source.
    fn mask(&self);
}

bitflags! {
    /// The `CNT{P,V}_CTL` control field of the generic timers.
    pub struct TimerCtl: u64 {
        /// The timer is enabled.
        const ENABLE = 1 << 0;
        /// The timer interrupt is masked.
        const IMASK = 1 << 1;
        /// The timer condition is met.
        const ISTATUS = 1 << 2;
    }
}

/// A generic timer, either physical or virtual, of the current or the guest
/// exception level.
pub struct GenericTimer<'a, M> {
    machine: &'a M,
    ctl: SysReg,
    name: &'static str,
}

impl<'a, M: Machine> GenericTimer<'a, M> {
    /// The physical timer of the current level.
    pub fn physical(machine: &'a M) -> Self {
        Self::new(machine, SysReg::CntpCtlEl0, "PHYS timer")
    }

    /// The virtual timer of the current level.
    pub fn virt(machine: &'a M) -> Self {
        Self::new(machine, SysReg::CntvCtlEl0, "VIRT timer")
    }

    /// The physical timer as seen by the guest at EL1.
    pub fn guest_physical(machine: &'a M) -> Self {
        Self::new(machine, SysReg::CntpCtlEl02, "PHYS EL02 timer")
    }

    /// The virtual timer as seen by the guest at EL1.
    pub fn guest_virt(machine: &'a M) -> Self {
        Self::new(machine, SysReg::CntvCtlEl02, "VIRT EL02 timer")
    }

    fn new(machine: &'a M, ctl: SysReg, name: &'static str) -> Self {
        Self { machine, ctl, name }
    }
}

impl<M: Machine> InterruptSource for GenericTimer<'_, M> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_pending(&self) -> bool {
        // Enabled, unmasked and asserted. Anything else in the register means
        // the timer is not the one firing.
        self.machine.read(self.ctl) == (TimerCtl::ENABLE | TimerCtl::ISTATUS).bits()
    }

    fn mask(&self) {
        self.machine.write(self.ctl, TimerCtl::all().bits());
    }
}

/// `PMCR0.IMODE`, the delivery mode of the core PMC overflow interrupt.
const PMCR0_IMODE: core::ops::Range<usize> = 8..11;
/// `PMCR0.IACT`, set while the overflow interrupt is active.
const PMCR0_IACT: usize = 11;
/// `UPMCR0.IMODE`, the delivery mode of the uncore PMC overflow interrupt.
const UPMCR0_IMODE: core::ops::Range<usize> = 16..19;
/// `UPMSR.IACT`, read-only.
const UPMSR_IACT: usize = 0;
/// The `IMODE` value selecting FIQ delivery.
const IMODE_FIQ: u64 = 4;

fn field_mask(range: core::ops::Range<usize>) -> u64 {
    ((1 << range.len()) - 1) << range.start
}

/// The overflow interrupt of the core performance counters.
pub struct PmcOverflow<'a, M> {
    machine: &'a M,
}

impl<'a, M: Machine> PmcOverflow<'a, M> {
    /// Creates the source.
    pub fn new(machine: &'a M) -> Self {
        Self { machine }
    }
}

impl<M: Machine> InterruptSource for PmcOverflow<'_, M> {
    fn name(&self) -> &'static str {
        "PMC"
    }

    fn is_pending(&self) -> bool {
        let pmcr0 = self.machine.read(SysReg::AplPmcr0);
        pmcr0.get_bits(PMCR0_IMODE) == IMODE_FIQ && pmcr0.get_bit(PMCR0_IACT)
    }

    fn mask(&self) {
        self.machine.clear_bits(
            SysReg::AplPmcr0,
            field_mask(PMCR0_IMODE) | (1 << PMCR0_IACT),
        );
    }
}

/// The overflow interrupt of the uncore performance counters.
pub struct UncorePmcOverflow<'a, M> {
    machine: &'a M,
}

impl<'a, M: Machine> UncorePmcOverflow<'a, M> {
    /// Creates the source.
    pub fn new(machine: &'a M) -> Self {
        Self { machine }
    }
}

impl<M: Machine> InterruptSource for UncorePmcOverflow<'_, M> {
    fn name(&self) -> &'static str {
        "UPMC"
    }

    fn is_pending(&self) -> bool {
        let upmcr0 = self.machine.read(SysReg::AplUpmcr0);
        upmcr0.get_bits(UPMCR0_IMODE) == IMODE_FIQ
            && self.machine.read(SysReg::AplUpmsr).get_bit(UPMSR_IACT)
    }

    fn mask(&self) {
        // The active flag lives in the read-only UPMSR, so switching the
        // delivery mode off is the only way to silence it.
        self.machine
            .clear_bits(SysReg::AplUpmcr0, field_mask(UPMCR0_IMODE));
    }
}
