// SPDX-License-Identifier: MPL-2.0

//! Decode-and-print of the context of a trap.

use core::fmt::{self, Write};

use super::{
    desc,
    frame::TrapFrame,
    syndrome::{Origin, SavedState, Spsr},
};
use crate::{
    config::TrapConfig,
    hw::{Machine, SysReg},
};

/// The labels of the register dump rows, four registers per row.
const ROW_LABELS: [&str; 8] = [
    "x0-x3", "x4-x7", "x8-x11", "x12-x15", "x16-x19", "x20-x23", "x24-x27", "x28-x30",
];

/// Names the mode that a trap with the saved status `spsr` was taken from.
///
/// Guarded-level names are used when the CPU is in a guarded level and
/// `ASPSR` says that the trap came from one too.
pub(crate) fn exception_source<M: Machine>(machine: &M, spsr: Spsr) -> &'static str {
    let guarded = machine.in_gl12() && machine.read(SysReg::AplAspsrGl1) & 1 != 0;
    desc::mode_name(spsr.mode(), guarded)
}

/// Prints everything known about the trap described by `frame` and the
/// exception state of `origin`.
///
/// Reading `L2C_ERR_STS` and writing it back clears its sticky error bits.
pub fn report<M: Machine>(
    machine: &M,
    config: &TrapConfig,
    frame: &TrapFrame,
    origin: Origin,
    out: &mut impl Write,
) -> fmt::Result {
    let saved = SavedState::read(machine, origin);
    let gl12 = machine.in_gl12();

    writeln!(out, "Exception taken from {}", exception_source(machine, saved.spsr))?;
    writeln!(
        out,
        "Running in {}",
        desc::level_name(machine.read(SysReg::CurrentEl), gl12)
    )?;
    writeln!(out, "MPIDR: {:#x}", machine.read(SysReg::MpidrEl1))?;

    writeln!(out, "Registers: (@{:p})", frame)?;
    for (label, regs) in ROW_LABELS.iter().zip(frame.x.chunks(4)) {
        write!(out, "{:>7}:", label)?;
        for reg in regs {
            write!(out, " {:016x}", reg)?;
        }
        writeln!(out)?;
    }

    writeln!(
        out,
        "PC:       {:#x} (rel: {:#x})",
        saved.elr,
        saved.elr.wrapping_sub(config.image_base)
    )?;
    writeln!(out, "SP:       {:#x}", frame.stack_pointer())?;
    writeln!(out, "SPSR_EL1: {:#x}", saved.spsr.0)?;
    if gl12 {
        writeln!(out, "ASPSR:    {:#x}", machine.read(SysReg::AplAspsrGl1))?;
    }
    writeln!(out, "FAR_EL1:  {:#x}", saved.far)?;
    writeln!(
        out,
        "ESR_EL1:  {:#x} ({})",
        saved.esr.0,
        saved.esr.class().description()
    )?;

    let l2c_err_sts = machine.read(SysReg::AplL2cErrSts);
    writeln!(out, "L2C_ERR_STS: {:#x}", l2c_err_sts)?;
    writeln!(out, "L2C_ERR_ADR: {:#x}", machine.read(SysReg::AplL2cErrAdr))?;
    writeln!(out, "L2C_ERR_INF: {:#x}", machine.read(SysReg::AplL2cErrInf))?;
    machine.write(SysReg::AplL2cErrSts, l2c_err_sts);

    let core_errors = if machine.is_ecore() {
        [
            ("E_LSU_ERR_STS", SysReg::AplELsuErrSts),
            ("E_FED_ERR_STS", SysReg::AplEFedErrSts),
            ("E_MMU_ERR_STS", SysReg::AplEMmuErrSts),
        ]
    } else {
        [
            ("LSU_ERR_STS", SysReg::AplLsuErrSts),
            ("FED_ERR_STS", SysReg::AplFedErrSts),
            ("MMU_ERR_STS", SysReg::AplMmuErrSts),
        ]
    };
    for (name, reg) in core_errors {
        writeln!(out, "{}: {:#x}", name, machine.read(reg))?;
    }

    Ok(())
}
