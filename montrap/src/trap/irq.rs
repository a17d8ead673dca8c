// SPDX-License-Identifier: MPL-2.0

//! The IRQ and FIQ handlers.
//!
//! Neither dispatches to drivers. The IRQ handler decodes the pending event
//! and the FIQ handler masks whichever sources are firing, so that the
//! monitor keeps running after an unexpected interrupt.

use core::fmt::Write;

use log::debug;

use super::{report::exception_source, syndrome::Spsr, TrapContext};
use crate::hw::{
    GenericTimer, InterruptSource, Machine, PmcOverflow, SysReg, UncorePmcOverflow,
};

/// The UART registers dumped on IRQs, as offsets from the UART base.
const UART_STATUS_REGS: [(&str, u64); 4] = [
    ("UCON", 0x04),
    ("UTRSTAT", 0x10),
    ("UERSTAT", 0x14),
    ("UFSTAT", 0x18),
];

/// Handles an IRQ.
pub fn handle_irq<M: Machine>(ctx: &TrapContext<'_, M>, out: &mut impl Write) {
    let machine = ctx.machine;

    // Sample the UART first, printing can change its state.
    let uart = ctx.config.uart_debug.map(|base| {
        UART_STATUS_REGS.map(|(name, offset)| {
            // SAFETY: `uart_debug` is the base of a mapped UART, whose
            // status registers are 32-bit words.
            (name, unsafe { machine.read_u32(base + offset) })
        })
    });

    let spsr = Spsr(machine.read(SysReg::SpsrEl1));
    let _ = writeln!(out, "Exception: IRQ (from {})", exception_source(machine, spsr));

    // SAFETY: `irq_event` is the address of a mapped interrupt controller
    // register.
    let event = unsafe { machine.read_u32(ctx.config.irq_event) };
    let _ = writeln!(
        out,
        " type: {} num: {} mpidr: {:x}",
        event >> 16,
        event & 0xffff,
        machine.read(SysReg::MpidrEl1)
    );

    for (name, value) in uart.into_iter().flatten() {
        let _ = writeln!(out, " {}: {:#x}", name, value);
    }
}

/// Handles an FIQ, returning how many sources were masked.
pub fn handle_fiq<M: Machine>(ctx: &TrapContext<'_, M>, out: &mut impl Write) -> usize {
    let machine = ctx.machine;

    let spsr = Spsr(machine.read(SysReg::SpsrEl1));
    let _ = writeln!(out, "Exception: FIQ (from {})", exception_source(machine, spsr));

    let mut masked = mask_pending(
        &[&GenericTimer::physical(machine), &GenericTimer::virt(machine)],
        out,
    );
    if machine.in_el2() {
        masked += mask_pending(
            &[
                &GenericTimer::guest_physical(machine),
                &GenericTimer::guest_virt(machine),
            ],
            out,
        );
    }
    masked += mask_pending(
        &[&PmcOverflow::new(machine), &UncorePmcOverflow::new(machine)],
        out,
    );
    masked
}

/// Masks every pending source of `sources`, in order.
///
/// Returns the number of sources masked.
pub fn mask_pending(sources: &[&dyn InterruptSource], out: &mut impl Write) -> usize {
    let mut masked = 0;
    for source in sources.iter().filter(|source| source.is_pending()) {
        let _ = writeln!(out, "  {} IRQ, masking", source.name());
        source.mask();
        debug!("masked FIQ source {}", source.name());
        masked += 1;
    }
    masked
}
