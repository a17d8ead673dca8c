// SPDX-License-Identifier: MPL-2.0

//! Per-CPU setup and teardown of exception handling.

use log::info;

use crate::{
    config::TrapConfig,
    cpu::CpuTrapState,
    hw::{Barrier, Daif, HcrFlags, Machine, SysReg},
    prelude::*,
};

/// Installs the exception vectors on the current CPU and unmasks SErrors,
/// IRQs and FIQs.
///
/// At EL2 this also configures `HCR_EL2` to host a guest at EL1 and installs
/// the guest vectors, which forward guest exceptions to us.
///
/// # Errors
///
/// Returns `Error::AlreadyInitialized` if the current CPU has been
/// initialized already. No register is written then.
pub fn init_current_cpu<M: Machine>(
    machine: &M,
    config: &TrapConfig,
    state: &CpuTrapState,
) -> Result<()> {
    state.mark_initialized()?;

    machine.write(SysReg::VbarEl1, config.vectors);
    machine.write(SysReg::Daif, Daif::empty().bits());

    let in_el2 = machine.in_el2();
    if in_el2 {
        machine.write(SysReg::HcrEl2, HcrFlags::host_default().bits());
        machine.write(SysReg::VbarEl12, config.guest_vectors);
        machine.barrier(Barrier::Isb);
    }

    info!(
        "exception handling initialized at {}, vectors at {:#x}",
        if in_el2 { "EL2" } else { "EL1" },
        config.vectors
    );
    Ok(())
}

/// Masks SErrors, IRQs and FIQs on the current CPU.
///
/// Used before handing the CPU over to other code, which then may call
/// [`init_current_cpu`] again.
pub fn shutdown_current_cpu<M: Machine>(machine: &M, state: &CpuTrapState) {
    machine.write(SysReg::Daif, (Daif::A | Daif::I | Daif::F).bits());
    state.mark_shut_down();
    info!("exception handling shut down");
}
