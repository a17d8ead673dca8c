// SPDX-License-Identifier: MPL-2.0

//! The bare-metal AArch64 backend.
//!
//! The vector tables and trampolines are assembled by the monitor. Each
//! trampoline saves `x0`..`x30` into a [`TrapFrame`] on the stack and calls
//! one of the `exc_*` functions below with its address.

use core::{arch::asm, ptr::NonNull};

use volatile::{access::ReadOnly, VolatileRef};

use crate::{
    config::{self, TrapConfig},
    console::{self, Console, ConsoleWriter},
    cpu::{self, CpuId, CpuTrapState},
    hw::{Barrier, Machine, SysReg},
    prelude::*,
    trap::{self, Guard, TrapFrame},
};

unsafe extern "C" {
    /// Flushes the caches and resets the SoC.
    #[link_name = "flush_and_reboot"]
    fn reboot() -> !;
    /// The stub that EL0 code returns to with `brk`.
    fn el0_ret();
    /// The stub that EL1 code returns to with `hvc #0`.
    fn el1_ret();
    #[link_name = "_vectors_start"]
    static VECTORS_START: u8;
    #[link_name = "_el1_vectors_start"]
    static EL1_VECTORS_START: u8;
    #[link_name = "_base"]
    static IMAGE_BASE: u8;
}

macro_rules! mrs {
    ($reg:literal) => {{
        let value: u64;
        // SAFETY: Reading the system registers of the trap layer has no
        // side effects.
        unsafe {
            asm!(
                concat!("mrs {}, ", $reg),
                out(reg) value,
                options(nomem, nostack, preserves_flags),
            );
        }
        value
    }};
}

macro_rules! msr {
    ($reg:literal, $value:expr) => {{
        let value: u64 = $value;
        // SAFETY: The trap layer owns the exception state of the CPU.
        unsafe {
            asm!(
                concat!("msr ", $reg, ", {}"),
                in(reg) value,
                options(nostack, preserves_flags),
            );
        }
    }};
}

/// The processor this code runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareMachine;

impl Machine for HardwareMachine {
    fn read(&self, reg: SysReg) -> u64 {
        match reg {
            SysReg::CurrentEl => mrs!("CurrentEL"),
            SysReg::Daif => mrs!("daif"),
            SysReg::MpidrEl1 => mrs!("mpidr_el1"),
            SysReg::VbarEl1 => mrs!("vbar_el1"),
            SysReg::VbarEl12 => mrs!("s3_5_c12_c0_0"),
            SysReg::HcrEl2 => mrs!("hcr_el2"),
            SysReg::SpsrEl1 => mrs!("spsr_el1"),
            SysReg::SpsrEl12 => mrs!("s3_5_c4_c0_0"),
            SysReg::SpsrEl2 => mrs!("spsr_el2"),
            SysReg::ElrEl1 => mrs!("elr_el1"),
            SysReg::ElrEl12 => mrs!("s3_5_c4_c0_1"),
            SysReg::ElrEl2 => mrs!("elr_el2"),
            SysReg::EsrEl1 => mrs!("esr_el1"),
            SysReg::EsrEl12 => mrs!("s3_5_c5_c2_0"),
            SysReg::EsrEl2 => mrs!("esr_el2"),
            SysReg::FarEl1 => mrs!("far_el1"),
            SysReg::FarEl12 => mrs!("s3_5_c6_c0_0"),
            SysReg::CntpCtlEl0 => mrs!("cntp_ctl_el0"),
            SysReg::CntvCtlEl0 => mrs!("cntv_ctl_el0"),
            SysReg::CntpCtlEl02 => mrs!("s3_5_c14_c2_1"),
            SysReg::CntvCtlEl02 => mrs!("s3_5_c14_c3_1"),
            SysReg::AplGxfStatusEl1 => mrs!("s3_6_c15_c8_0"),
            SysReg::AplAspsrGl1 => mrs!("s3_6_c15_c8_3"),
            SysReg::AplL2cErrSts => mrs!("s3_3_c15_c8_0"),
            SysReg::AplL2cErrAdr => mrs!("s3_3_c15_c9_0"),
            SysReg::AplL2cErrInf => mrs!("s3_3_c15_c10_0"),
            SysReg::AplLsuErrSts => mrs!("s3_3_c15_c0_0"),
            SysReg::AplFedErrSts => mrs!("s3_4_c15_c0_0"),
            SysReg::AplMmuErrSts => mrs!("s3_6_c15_c0_0"),
            SysReg::AplELsuErrSts => mrs!("s3_3_c15_c2_0"),
            SysReg::AplEFedErrSts => mrs!("s3_4_c15_c0_2"),
            SysReg::AplEMmuErrSts => mrs!("s3_6_c15_c2_0"),
            SysReg::AplPmcr0 => mrs!("s3_1_c15_c0_0"),
            SysReg::AplUpmcr0 => mrs!("s3_7_c15_c0_4"),
            SysReg::AplUpmsr => mrs!("s3_7_c15_c6_4"),
        }
    }

    fn write(&self, reg: SysReg, value: u64) {
        match reg {
            // Read-only.
            SysReg::CurrentEl | SysReg::MpidrEl1 | SysReg::AplUpmsr => {}
            SysReg::Daif => msr!("daif", value),
            SysReg::VbarEl1 => msr!("vbar_el1", value),
            SysReg::VbarEl12 => msr!("s3_5_c12_c0_0", value),
            SysReg::HcrEl2 => msr!("hcr_el2", value),
            SysReg::SpsrEl1 => msr!("spsr_el1", value),
            SysReg::SpsrEl12 => msr!("s3_5_c4_c0_0", value),
            SysReg::SpsrEl2 => msr!("spsr_el2", value),
            SysReg::ElrEl1 => msr!("elr_el1", value),
            SysReg::ElrEl12 => msr!("s3_5_c4_c0_1", value),
            SysReg::ElrEl2 => msr!("elr_el2", value),
            SysReg::EsrEl1 => msr!("esr_el1", value),
            SysReg::EsrEl12 => msr!("s3_5_c5_c2_0", value),
            SysReg::EsrEl2 => msr!("esr_el2", value),
            SysReg::FarEl1 => msr!("far_el1", value),
            SysReg::FarEl12 => msr!("s3_5_c6_c0_0", value),
            SysReg::CntpCtlEl0 => msr!("cntp_ctl_el0", value),
            SysReg::CntvCtlEl0 => msr!("cntv_ctl_el0", value),
            SysReg::CntpCtlEl02 => msr!("s3_5_c14_c2_1", value),
            SysReg::CntvCtlEl02 => msr!("s3_5_c14_c3_1", value),
            SysReg::AplGxfStatusEl1 => msr!("s3_6_c15_c8_0", value),
            SysReg::AplAspsrGl1 => msr!("s3_6_c15_c8_3", value),
            SysReg::AplL2cErrSts => msr!("s3_3_c15_c8_0", value),
            SysReg::AplL2cErrAdr => msr!("s3_3_c15_c9_0", value),
            SysReg::AplL2cErrInf => msr!("s3_3_c15_c10_0", value),
            SysReg::AplLsuErrSts => msr!("s3_3_c15_c0_0", value),
            SysReg::AplFedErrSts => msr!("s3_4_c15_c0_0", value),
            SysReg::AplMmuErrSts => msr!("s3_6_c15_c0_0", value),
            SysReg::AplELsuErrSts => msr!("s3_3_c15_c2_0", value),
            SysReg::AplEFedErrSts => msr!("s3_4_c15_c0_2", value),
            SysReg::AplEMmuErrSts => msr!("s3_6_c15_c2_0", value),
            SysReg::AplPmcr0 => msr!("s3_1_c15_c0_0", value),
            SysReg::AplUpmcr0 => msr!("s3_7_c15_c0_4", value),
        }
    }

    fn barrier(&self, barrier: Barrier) {
        // SAFETY: Barriers only order execution.
        unsafe {
            match barrier {
                Barrier::Isb => asm!("isb", options(nostack, preserves_flags)),
                Barrier::DsbSy => asm!("dsb sy", options(nostack, preserves_flags)),
            }
        }
    }

    unsafe fn read_u32(&self, addr: u64) -> u32 {
        // Nothing is mapped at zero.
        let Some(ptr) = NonNull::new(addr as *mut u32) else {
            return 0;
        };
        // SAFETY: The caller guarantees that `addr` is mapped and aligned.
        let word = unsafe { VolatileRef::new_restricted(ReadOnly, ptr) };
        word.as_ptr().read()
    }

    fn flush_and_reboot(&self) -> ! {
        console::flush();
        // SAFETY: The reboot routine takes over the CPU and never returns.
        unsafe { reboot() }
    }
}

/// Returns the configuration derived from the linker-provided image layout.
pub fn layout_config() -> TrapConfig {
    TrapConfig::default()
        .with_vectors(
            (&raw const VECTORS_START) as u64,
            (&raw const EL1_VECTORS_START) as u64,
        )
        .with_return_stubs(el0_ret as *const () as u64, el1_ret as *const () as u64)
        .with_image_base((&raw const IMAGE_BASE) as u64)
}

/// Sets up the trap layer with the image layout and the `montrap.*`
/// arguments of `cmdline`.
///
/// # Errors
///
/// Returns `Error::InvalidArgs` if a `montrap.*` argument is malformed.
pub fn init(console: &'static dyn Console, cmdline: &str) -> Result<&'static TrapConfig> {
    let config = layout_config().parse_cmdline(cmdline)?;
    Ok(crate::init(console, config))
}

fn current_config() -> &'static TrapConfig {
    config::get().unwrap_or_else(|_| config::init(layout_config()))
}

/// Returns the trap state of the current CPU.
///
/// # Errors
///
/// Returns `Error::InvalidArgs` if the affinity of the current CPU is outside
/// of the mapped layout.
pub fn current_trap_state() -> Result<&'static CpuTrapState> {
    Ok(cpu::trap_state(CpuId::current(&HardwareMachine)?))
}

/// Runs `op` under `guard` on the current CPU.
///
/// # Errors
///
/// See [`CpuTrapState::probe`]. A CPU without trap state cannot probe and
/// gets `Error::InvalidArgs`.
pub fn probe<R>(guard: Guard, op: impl FnOnce() -> R) -> Result<R> {
    current_trap_state()?.probe(guard, op)
}

/// Sets up exception handling on the current CPU.
///
/// # Errors
///
/// Returns `Error::AlreadyInitialized` on a second call without a
/// [`shutdown_current_cpu`] in between, and `Error::InvalidArgs` on a CPU
/// without trap state.
pub fn init_current_cpu() -> Result<()> {
    trap::init_current_cpu(&HardwareMachine, current_config(), current_trap_state()?)
}

/// Masks SErrors, IRQs and FIQs on the current CPU.
pub fn shutdown_current_cpu() {
    let unmapped = CpuTrapState::new();
    let state = current_trap_state().unwrap_or(&unmapped);
    trap::shutdown_current_cpu(&HardwareMachine, state);
}

#[unsafe(no_mangle)]
extern "C" fn exc_sync(frame: &mut TrapFrame) {
    trap::with_current_cpu(&HardwareMachine, current_config(), |ctx| {
        ctx.sync_trap(frame, &mut ConsoleWriter)
    });
}

#[unsafe(no_mangle)]
extern "C" fn exc_irq(_frame: &mut TrapFrame) {
    trap::with_current_cpu(&HardwareMachine, current_config(), |ctx| {
        ctx.irq_trap(&mut ConsoleWriter)
    });
}

#[unsafe(no_mangle)]
extern "C" fn exc_fiq(_frame: &mut TrapFrame) {
    trap::with_current_cpu(&HardwareMachine, current_config(), |ctx| {
        ctx.fiq_trap(&mut ConsoleWriter)
    });
}

#[unsafe(no_mangle)]
extern "C" fn exc_serr(frame: &mut TrapFrame) {
    trap::with_current_cpu(&HardwareMachine, current_config(), |ctx| {
        ctx.serror_trap(frame, &mut ConsoleWriter)
    });
}
