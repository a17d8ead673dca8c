// SPDX-License-Identifier: MPL-2.0

//! Handling of the traps taken by the monitor.
//!
//! The assembly trampolines save the general registers into a [`TrapFrame`]
//! and call one of the `extern "C"` entry points in [`crate::arch`]. Those
//! build a [`TrapContext`] for the current CPU and hand over to the
//! `*_trap` methods here, which classify the trap, print diagnostics and
//! either set up the resumption or reboot.

pub mod desc;
mod frame;
mod guard;
mod init;
mod irq;
mod report;
mod serror;
mod sync;
mod syndrome;

#[cfg(test)]
pub(crate) mod test;

use core::fmt::Write;

use log::warn;

pub use self::{
    frame::{TrapFrame, TRAP_FRAME_SIZE},
    guard::{Guard, GuardFlags, GuardKind, Resolution, POISON},
    init::{init_current_cpu, shutdown_current_cpu},
    irq::{handle_fiq, handle_irq, mask_pending},
    report::report,
    serror::{handle_serror, SErrorOutcome},
    sync::{handle_sync, SyncOutcome},
    syndrome::{Esr, ExceptionClass, Origin, SavedState, Spsr},
};
use crate::{
    config::TrapConfig,
    cpu::{self, CpuId, CpuTrapState},
    hw::{Machine, SysReg},
};

/// Everything a trap handler works with on the current CPU.
pub struct TrapContext<'a, M> {
    /// The hardware.
    pub machine: &'a M,
    /// The configuration.
    pub config: &'a TrapConfig,
    /// The trap state of the current CPU.
    pub state: &'a CpuTrapState,
}

impl<'a, M: Machine> TrapContext<'a, M> {
    /// Creates a context.
    pub fn new(machine: &'a M, config: &'a TrapConfig, state: &'a CpuTrapState) -> Self {
        Self {
            machine,
            config,
            state,
        }
    }

    /// Handles a synchronous exception, rebooting if it cannot be recovered.
    pub fn sync_trap(&self, frame: &mut TrapFrame, out: &mut impl Write) {
        if handle_sync(self, frame, out) == SyncOutcome::Fatal {
            self.machine.flush_and_reboot();
        }
    }

    /// Handles an IRQ.
    pub fn irq_trap(&self, out: &mut impl Write) {
        handle_irq(self, out);
    }

    /// Handles an FIQ.
    pub fn fiq_trap(&self, out: &mut impl Write) {
        handle_fiq(self, out);
    }

    /// Handles an SError, rebooting if the policy says so.
    pub fn serror_trap(&self, frame: &TrapFrame, out: &mut impl Write) {
        if handle_serror(self, frame, out) == SErrorOutcome::Fatal {
            self.machine.flush_and_reboot();
        }
    }
}

/// Runs `f` with the context of the CPU executing it.
///
/// A CPU whose affinity is outside of the mapped layout has no trap state.
/// It gets a fresh one for the duration of `f`, with no guard armed, so its
/// faults are fatal and never consume the guard of another CPU.
pub fn with_current_cpu<M: Machine, R>(
    machine: &M,
    config: &TrapConfig,
    f: impl FnOnce(&TrapContext<'_, M>) -> R,
) -> R {
    let unmapped;
    let state = match CpuId::current(machine) {
        Ok(cpu) => cpu::trap_state(cpu),
        Err(_) => {
            warn!(
                "trap on unmapped CPU (MPIDR {:#x}), guards are off",
                machine.read(SysReg::MpidrEl1)
            );
            unmapped = CpuTrapState::new();
            &unmapped
        }
    };
    f(&TrapContext::new(machine, config, state))
}
