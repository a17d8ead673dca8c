// SPDX-License-Identifier: MPL-2.0

//! The synchronous exception dispatcher.

use core::fmt::Write;

use log::debug;

use super::{
    frame::TrapFrame,
    guard::{self, Resolution},
    report::report,
    syndrome::{Esr, ExceptionClass, Origin, Spsr},
    TrapContext,
};
use crate::hw::{Machine, SysReg};

/// The hypercall immediate that returns cleanly from EL1.
const HVC_EL1_RETURN: u16 = 0;

/// How a synchronous exception ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A lower level handed control back. The exception return resumes at
    /// `stub`.
    CooperativeReturn {
        /// The return stub now in the link register.
        stub: u64,
    },
    /// A guarded fault was recovered. The exception return resumes at `elr`.
    Resumed {
        /// The resumption address now in `ELR_EL1`.
        elr: u64,
    },
    /// The fault was not guarded. No resumption address was written and the
    /// CPU must be rebooted.
    Fatal,
}

/// Handles a synchronous exception.
///
/// Diagnostics go to `out` unless the armed guard is silent. The silent bit
/// is sampled once, before a `Return` guard gets consumed.
pub fn handle_sync<M: Machine>(
    ctx: &TrapContext<'_, M>,
    frame: &mut TrapFrame,
    out: &mut impl Write,
) -> SyncOutcome {
    let machine = ctx.machine;
    let silent = ctx.state.guard().is_silent();

    let spsr = Spsr(machine.read(SysReg::SpsrEl1));
    let class = Esr(machine.read(SysReg::EsrEl1)).class();

    if spsr.mode() == Spsr::EL0T && class == ExceptionClass::BRK64 {
        // Let the regular exception return take us to the EL0 return stub.
        machine.write(SysReg::SpsrEl1, Spsr::EL2H as u64);
        machine.write(SysReg::ElrEl1, ctx.config.el0_return);
        return SyncOutcome::CooperativeReturn {
            stub: ctx.config.el0_return,
        };
    }

    let mut origin = Origin::Direct;
    if machine.in_el2()
        && !machine.in_gl12()
        && spsr.mode() == Spsr::EL1H
        && class == ExceptionClass::HVC64
    {
        let imm = Esr(machine.read(SysReg::EsrEl2)).imm16();
        match imm {
            HVC_EL1_RETURN => {
                machine.write(SysReg::SpsrEl2, Spsr::EL2H as u64);
                machine.write(SysReg::ElrEl2, ctx.config.el1_return);
                return SyncOutcome::CooperativeReturn {
                    stub: ctx.config.el1_return,
                };
            }
            0x10..=0x1f => {
                if !silent {
                    let _ = writeln!(out, "EL1 Exception: {:#x}", imm);
                }
                // The guest vectors forward their exceptions with these
                // hypercalls. Handle the guest exception in place of the
                // hypercall itself.
                origin = Origin::ForwardedFromNested;
                machine.write(SysReg::SpsrEl2, machine.read(SysReg::SpsrEl12));
                machine.write(SysReg::ElrEl2, machine.read(SysReg::ElrEl12));
            }
            _ => {
                let _ = writeln!(out, "Unknown HVC: {:#x}", imm);
            }
        }
    } else if !silent {
        let _ = writeln!(out, "Exception: SYNC");
    }

    machine.sync_barriers();

    if !silent {
        let _ = report(machine, ctx.config, frame, origin, out);
    }

    let fault_pc = machine.read(SysReg::ElrEl1);
    let Resolution::Resume(elr) = guard::resolve(machine, ctx.state, frame, fault_pc) else {
        return SyncOutcome::Fatal;
    };
    ctx.state.record_fault();
    debug!("recovered fault at {:#x} ({:?})", fault_pc, origin);

    if !silent {
        let _ = writeln!(out, "Recovering from exception (ELR={:#x})", elr);
    }
    machine.write(SysReg::ElrEl1, elr);
    machine.sync_barriers();

    SyncOutcome::Resumed { elr }
}
