// SPDX-License-Identifier: MPL-2.0

use std::{cell::RefCell, collections::BTreeMap, string::String, vec::Vec};

use super::*;
use crate::{
    config::SErrorPolicy,
    hw::{Barrier, Daif, InterruptSource, SysReg},
    Error,
};

/// A machine whose registers and memory live in maps.
///
/// Unset registers read as zero. Reading unmapped memory and rebooting
/// panic, so a test can expect either. At EL2 the `_EL1` exception registers
/// are the `_EL2` ones, as with `HCR_EL2.E2H` set.
pub(crate) struct MockMachine {
    regs: RefCell<BTreeMap<SysReg, u64>>,
    memory: RefCell<BTreeMap<u64, u32>>,
    writes: RefCell<Vec<(SysReg, u64)>>,
    barriers: RefCell<Vec<Barrier>>,
}

impl MockMachine {
    pub(crate) fn new() -> Self {
        Self {
            regs: RefCell::new(BTreeMap::new()),
            memory: RefCell::new(BTreeMap::new()),
            writes: RefCell::new(Vec::new()),
            barriers: RefCell::new(Vec::new()),
        }
    }

    /// Returns the register that `reg` accesses at the current level.
    fn redirect(&self, reg: SysReg) -> SysReg {
        if self.regs.borrow().get(&SysReg::CurrentEl) != Some(&0x08) {
            return reg;
        }
        match reg {
            SysReg::SpsrEl1 => SysReg::SpsrEl2,
            SysReg::ElrEl1 => SysReg::ElrEl2,
            SysReg::EsrEl1 => SysReg::EsrEl2,
            other => other,
        }
    }

    /// Sets a register without recording a write.
    pub(crate) fn set(&self, reg: SysReg, value: u64) {
        let reg = self.redirect(reg);
        self.regs.borrow_mut().insert(reg, value);
    }

    pub(crate) fn get(&self, reg: SysReg) -> u64 {
        let reg = self.redirect(reg);
        self.regs.borrow().get(&reg).copied().unwrap_or(0)
    }

    pub(crate) fn map_word(&self, addr: u64, value: u32) {
        self.memory.borrow_mut().insert(addr, value);
    }

    pub(crate) fn writes(&self) -> Vec<(SysReg, u64)> {
        self.writes.borrow().clone()
    }

    pub(crate) fn was_written(&self, reg: SysReg) -> bool {
        self.writes.borrow().iter().any(|(written, _)| *written == reg)
    }

    pub(crate) fn barriers(&self) -> Vec<Barrier> {
        self.barriers.borrow().clone()
    }
}

impl Machine for MockMachine {
    fn read(&self, reg: SysReg) -> u64 {
        self.get(reg)
    }

    fn write(&self, reg: SysReg, value: u64) {
        self.writes.borrow_mut().push((reg, value));
        self.set(reg, value);
    }

    fn barrier(&self, barrier: Barrier) {
        self.barriers.borrow_mut().push(barrier);
    }

    unsafe fn read_u32(&self, addr: u64) -> u32 {
        match self.memory.borrow().get(&addr) {
            Some(value) => *value,
            None => panic!("unmapped read at {addr:#x}"),
        }
    }

    fn flush_and_reboot(&self) -> ! {
        panic!("reboot");
    }
}

const EL0_RETURN: u64 = 0x8000;
const EL1_RETURN: u64 = 0x9000;
const IMAGE_BASE: u64 = 0x1000;

fn config() -> TrapConfig {
    TrapConfig::default()
        .with_vectors(0xa000, 0xb000)
        .with_return_stubs(EL0_RETURN, EL1_RETURN)
        .with_image_base(IMAGE_BASE)
}

/// A machine at EL1 that took a data abort at `pc` from EL1h.
fn data_abort_at(pc: u64) -> MockMachine {
    let machine = MockMachine::new();
    machine.set(SysReg::CurrentEl, 0x04);
    machine.set(SysReg::MpidrEl1, 0x8000_0000);
    machine.set(SysReg::SpsrEl1, Spsr::EL1H as u64);
    machine.set(
        SysReg::EsrEl1,
        u64::from(ExceptionClass::DATA_ABORT_CURRENT.code()) << 26,
    );
    machine.set(SysReg::ElrEl1, pc);
    machine
}

/// A machine at EL2 that took `hvc #imm` from the guest at EL1h.
fn hypercall(imm: u64) -> MockMachine {
    let machine = MockMachine::new();
    machine.set(SysReg::CurrentEl, 0x08);
    machine.set(SysReg::MpidrEl1, 0x8000_0000);
    machine.set(SysReg::SpsrEl1, Spsr::EL1H as u64);
    machine.set(SysReg::EsrEl1, (0x16 << 26) | imm);
    machine
}

fn numbered_frame() -> TrapFrame {
    TrapFrame::new(core::array::from_fn(|i| i as u64))
}

#[test]
fn skip_resumes_at_next_instruction() {
    let machine = data_abort_at(0x1000);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP);
    let mut frame = numbered_frame();
    let mut out = String::new();

    let outcome = handle_sync(&TrapContext::new(&machine, &config, &state), &mut frame, &mut out);

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0x1004 });
    assert_eq!(machine.get(SysReg::ElrEl1), 0x1004);
    assert_eq!(state.fault_count(), 1);
    assert_eq!(state.guard(), Guard::SKIP);
    assert_eq!(frame, numbered_frame());
    assert!(out.starts_with("Exception: SYNC\n"));
    assert!(out.ends_with("Recovering from exception (ELR=0x1004)\n"));
    assert_eq!(
        machine.barriers(),
        [Barrier::Isb, Barrier::DsbSy, Barrier::Isb, Barrier::DsbSy]
    );
}

#[test]
fn skip_wraps_at_top_of_address_space() {
    let machine = data_abort_at(0xffff_ffff_ffff_fffc);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP.silent());

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut String::new(),
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0 });
    assert_eq!(machine.get(SysReg::ElrEl1), 0);
    assert_eq!(state.fault_count(), 1);
}

#[test]
fn mark_poisons_destination_register() {
    let machine = data_abort_at(0x2000);
    // ldr x5, [x1]
    machine.map_word(0x2000, 0xf940_0025);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::MARK.silent());
    let mut frame = numbered_frame();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut frame,
        &mut String::new(),
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0x2004 });
    assert_eq!(state.fault_count(), 1);
    let mut expected = numbered_frame();
    expected.x[5] = POISON;
    assert_eq!(frame, expected);
}

#[test]
fn mark_with_zero_register_leaves_frame() {
    let machine = data_abort_at(0x2000);
    // ldr xzr, [x1]
    machine.map_word(0x2000, 0xf940_003f);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::MARK.silent());
    let mut frame = numbered_frame();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut frame,
        &mut String::new(),
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0x2004 });
    assert_eq!(frame, numbered_frame());
}

#[test]
fn return_is_one_shot() {
    let machine = data_abort_at(0x3000);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::RETURN);
    let mut frame = numbered_frame();
    frame.x[30] = 0x4444;
    let ctx = TrapContext::new(&machine, &config, &state);

    let outcome = handle_sync(&ctx, &mut frame, &mut String::new());

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0x4444 });
    assert_eq!(frame.x[0], POISON);
    assert_eq!(frame.x[1], 1);
    assert_eq!(state.guard(), Guard::OFF);
    assert_eq!(state.fault_count(), 1);

    assert_eq!(
        handle_sync(&ctx, &mut frame, &mut String::new()),
        SyncOutcome::Fatal
    );
    assert_eq!(state.fault_count(), 1);
}

#[test]
fn unguarded_fault_is_fatal() {
    let machine = data_abort_at(0x1000);
    let config = config();
    let state = CpuTrapState::new();
    let mut frame = numbered_frame();
    let mut out = String::new();

    let outcome = handle_sync(&TrapContext::new(&machine, &config, &state), &mut frame, &mut out);

    assert_eq!(outcome, SyncOutcome::Fatal);
    assert!(!machine.was_written(SysReg::ElrEl1));
    assert_eq!(state.fault_count(), 0);
    assert!(out.contains("ESR_EL1:  0x94000000 (data abort (current))"));
    assert!(!out.contains("Recovering"));
}

#[test]
#[should_panic(expected = "reboot")]
fn unguarded_fault_reboots() {
    let machine = data_abort_at(0x1000);
    let config = config();
    let state = CpuTrapState::new();
    TrapContext::new(&machine, &config, &state)
        .sync_trap(&mut numbered_frame(), &mut String::new());
}

#[test]
fn silent_return_prints_nothing() {
    let machine = data_abort_at(0x3000);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::RETURN.silent());
    let mut out = String::new();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 30 });
    assert_eq!(out, "");
    assert_eq!(state.fault_count(), 1);
}

#[test]
fn brk_from_el0_returns_to_stub() {
    let machine = MockMachine::new();
    machine.set(SysReg::CurrentEl, 0x08);
    machine.set(SysReg::SpsrEl1, Spsr::EL0T as u64);
    machine.set(SysReg::EsrEl1, 0x3c << 26);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP);
    let mut out = String::new();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SyncOutcome::CooperativeReturn { stub: EL0_RETURN });
    assert_eq!(
        machine.writes(),
        [(SysReg::SpsrEl1, 0x09), (SysReg::ElrEl1, EL0_RETURN)]
    );
    assert_eq!(out, "");
    assert_eq!(state.guard(), Guard::SKIP);
    assert_eq!(state.fault_count(), 0);
}

#[test]
fn hvc_zero_returns_to_el1_stub() {
    let machine = hypercall(0);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::RETURN);
    let mut frame = numbered_frame();
    let mut out = String::new();

    let outcome = handle_sync(&TrapContext::new(&machine, &config, &state), &mut frame, &mut out);

    assert_eq!(outcome, SyncOutcome::CooperativeReturn { stub: EL1_RETURN });
    assert_eq!(
        machine.writes(),
        [(SysReg::SpsrEl2, 0x09), (SysReg::ElrEl2, EL1_RETURN)]
    );
    assert_eq!(state.guard(), Guard::RETURN);
    assert_eq!(state.fault_count(), 0);
    assert_eq!(frame, numbered_frame());
    assert_eq!(out, "");
}

#[test]
fn forwarded_guest_exception_uses_guest_state() {
    let machine = hypercall(0x15);
    machine.set(SysReg::SpsrEl12, 0x3c5);
    machine.set(SysReg::ElrEl12, 0x5000);
    machine.set(SysReg::EsrEl12, 0x25 << 26);
    machine.set(SysReg::FarEl12, 0xdead);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP);
    let mut out = String::new();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 0x5004 });
    assert_eq!(
        machine.writes()[..2],
        [(SysReg::SpsrEl2, 0x3c5), (SysReg::ElrEl2, 0x5000)]
    );
    assert_eq!(machine.get(SysReg::ElrEl2), 0x5004);
    assert!(out.starts_with("EL1 Exception: 0x15\n"));
    assert!(!out.contains("Exception: SYNC"));
    assert!(out.contains("Exception taken from EL1h\n"));
    assert!(out.contains("PC:       0x5000 (rel: 0x4000)\n"));
    assert!(out.contains("SPSR_EL1: 0x3c5\n"));
    assert!(out.contains("FAR_EL1:  0xdead\n"));
    assert!(out.contains("ESR_EL1:  0x94000000 (data abort (current))\n"));
}

#[test]
fn unknown_hvc_is_printed_even_when_silent() {
    let machine = hypercall(0x42);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP.silent());
    let mut out = String::new();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SyncOutcome::Resumed { elr: 4 });
    assert_eq!(out, "Unknown HVC: 0x42\n");
}

#[test]
#[should_panic(expected = "reboot")]
fn unknown_hvc_without_guard_reboots() {
    let machine = hypercall(0x42);
    let config = config();
    let state = CpuTrapState::new();
    TrapContext::new(&machine, &config, &state)
        .sync_trap(&mut numbered_frame(), &mut String::new());
}

#[test]
fn hvc_zero_ignores_guard() {
    for guard in [Guard::OFF, Guard::SKIP.silent()] {
        let machine = hypercall(0);
        let config = config();
        let state = CpuTrapState::new();
        state.set_guard(guard);
        let mut out = String::new();

        TrapContext::new(&machine, &config, &state).sync_trap(&mut numbered_frame(), &mut out);

        assert_eq!(machine.get(SysReg::ElrEl2), EL1_RETURN);
        assert_eq!(machine.get(SysReg::SpsrEl2), 0x09);
        assert_eq!(state.guard(), guard);
        assert_eq!(state.fault_count(), 0);
        assert_eq!(out, "");
    }
}

#[test]
fn hvc_from_guarded_level_is_a_plain_fault() {
    let machine = hypercall(0);
    machine.set(SysReg::AplGxfStatusEl1, 1);
    let config = config();
    let state = CpuTrapState::new();
    let mut out = String::new();

    let outcome = handle_sync(
        &TrapContext::new(&machine, &config, &state),
        &mut numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SyncOutcome::Fatal);
    assert!(!machine.was_written(SysReg::ElrEl2));
    assert!(out.starts_with("Exception: SYNC\n"));
}

#[test]
fn report_layout() {
    let machine = data_abort_at(0x1234);
    machine.set(SysReg::FarEl1, 0xfeed);
    machine.set(SysReg::AplL2cErrSts, 0x55);
    machine.set(SysReg::AplELsuErrSts, 0x7);
    let frame = numbered_frame();
    let mut out = String::new();

    report(&machine, &config(), &frame, Origin::Direct, &mut out).unwrap();

    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines[0], "Exception taken from EL1h");
    assert_eq!(lines[1], "Running in EL1");
    assert_eq!(lines[2], "MPIDR: 0x80000000");
    assert_eq!(lines[3], format!("Registers: (@{:p})", &frame));
    assert_eq!(
        lines[4],
        "  x0-x3: 0000000000000000 0000000000000001 0000000000000002 0000000000000003"
    );
    assert_eq!(
        lines[6],
        " x8-x11: 0000000000000008 0000000000000009 000000000000000a 000000000000000b"
    );
    assert_eq!(
        lines[11],
        "x28-x30: 000000000000001c 000000000000001d 000000000000001e"
    );
    assert_eq!(lines[12], "PC:       0x1234 (rel: 0x234)");
    assert_eq!(lines[13], format!("SP:       {:#x}", frame.stack_pointer()));
    assert_eq!(lines[14], "SPSR_EL1: 0x5");
    assert_eq!(lines[15], "FAR_EL1:  0xfeed");
    assert_eq!(lines[17], "L2C_ERR_STS: 0x55");
    assert_eq!(lines[20], "E_LSU_ERR_STS: 0x7");
    assert_eq!(lines.len(), 23);
    assert_eq!(machine.writes(), [(SysReg::AplL2cErrSts, 0x55)]);
}

#[test]
fn report_in_guarded_level() {
    let machine = data_abort_at(0x1234);
    machine.set(SysReg::CurrentEl, 0x08);
    machine.set(SysReg::SpsrEl1, Spsr::EL1H as u64);
    machine.set(SysReg::MpidrEl1, 0x8001_0000);
    machine.set(SysReg::AplGxfStatusEl1, 1);
    machine.set(SysReg::AplAspsrGl1, 1);
    let mut out = String::new();

    report(&machine, &config(), &numbered_frame(), Origin::Direct, &mut out).unwrap();

    assert!(out.starts_with("Exception taken from GL1h\nRunning in GL2\n"));
    assert!(out.contains("ASPSR:    0x1\n"));
    assert!(out.contains("LSU_ERR_STS: 0x0\n"));
    assert!(!out.contains("E_LSU_ERR_STS"));
}

#[test]
fn irq_decodes_event() {
    let machine = data_abort_at(0);
    let config = config();
    machine.map_word(config.irq_event, 0x0001_0025);
    let state = CpuTrapState::new();
    let mut out = String::new();

    TrapContext::new(&machine, &config, &state).irq_trap(&mut out);

    assert_eq!(
        out,
        "Exception: IRQ (from EL1h)\n type: 1 num: 37 mpidr: 80000000\n"
    );
    assert!(machine.writes().is_empty());
}

#[test]
fn irq_dumps_uart_status() {
    let machine = data_abort_at(0);
    let mut config = config();
    config.uart_debug = Some(0x2_3520_0000);
    machine.map_word(config.irq_event, 0);
    for (offset, value) in [(0x04, 0x5), (0x10, 0x6), (0x14, 0), (0x18, 0x100)] {
        machine.map_word(0x2_3520_0000 + offset, value);
    }
    let state = CpuTrapState::new();
    let mut out = String::new();

    handle_irq(&TrapContext::new(&machine, &config, &state), &mut out);

    let lines: Vec<_> = out.lines().collect();
    assert_eq!(
        lines[2..],
        [" UCON: 0x5", " UTRSTAT: 0x6", " UERSTAT: 0x0", " UFSTAT: 0x100"]
    );
}

#[test]
fn fiq_masks_pending_timer_only() {
    let machine = data_abort_at(0);
    machine.set(SysReg::CntpCtlEl0, 0b101);
    machine.set(SysReg::CntvCtlEl0, 0b001);
    // Guest timers are not looked at below EL2.
    machine.set(SysReg::CntpCtlEl02, 0b101);
    let config = config();
    let state = CpuTrapState::new();
    let mut out = String::new();

    let masked = handle_fiq(&TrapContext::new(&machine, &config, &state), &mut out);

    assert_eq!(masked, 1);
    assert_eq!(machine.get(SysReg::CntpCtlEl0), 0b111);
    assert_eq!(machine.get(SysReg::CntvCtlEl0), 0b001);
    assert_eq!(machine.get(SysReg::CntpCtlEl02), 0b101);
    assert_eq!(
        out,
        "Exception: FIQ (from EL1h)\n  PHYS timer IRQ, masking\n"
    );
}

#[test]
fn fiq_at_el2_checks_guest_timers() {
    let machine = hypercall(0);
    machine.set(SysReg::CntvCtlEl02, 0b101);
    machine.set(SysReg::AplPmcr0, (4 << 8) | (1 << 11));
    let config = config();
    let state = CpuTrapState::new();
    let mut out = String::new();

    let masked = handle_fiq(&TrapContext::new(&machine, &config, &state), &mut out);

    assert_eq!(masked, 2);
    assert_eq!(machine.get(SysReg::CntvCtlEl02), 0b111);
    assert_eq!(machine.get(SysReg::AplPmcr0), 0);
    assert!(out.ends_with("  VIRT EL02 timer IRQ, masking\n  PMC IRQ, masking\n"));
}

struct FakeSource {
    name: &'static str,
    pending: core::cell::Cell<bool>,
}

impl InterruptSource for FakeSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_pending(&self) -> bool {
        self.pending.get()
    }

    fn mask(&self) {
        self.pending.set(false);
    }
}

#[test]
fn mask_pending_keeps_order() {
    let sources = [("A", true), ("B", false), ("C", true)].map(|(name, pending)| FakeSource {
        name,
        pending: core::cell::Cell::new(pending),
    });
    let mut out = String::new();

    let masked = mask_pending(&[&sources[0], &sources[1], &sources[2]], &mut out);

    assert_eq!(masked, 2);
    assert_eq!(out, "  A IRQ, masking\n  C IRQ, masking\n");
    assert!(sources.iter().all(|source| !source.is_pending()));
}

#[test]
fn serror_reports_and_resumes() {
    let machine = data_abort_at(0x1000);
    let config = config();
    let state = CpuTrapState::new();
    let mut out = String::new();

    let outcome = handle_serror(
        &TrapContext::new(&machine, &config, &state),
        &numbered_frame(),
        &mut out,
    );

    assert_eq!(outcome, SErrorOutcome::Resumed);
    assert!(out.starts_with("Exception: SError\nException taken from EL1h\n"));
    assert_eq!(machine.barriers(), [Barrier::Isb, Barrier::DsbSy]);
}

#[test]
fn silent_serror_prints_nothing() {
    let machine = data_abort_at(0x1000);
    let config = config();
    let state = CpuTrapState::new();
    state.set_guard(Guard::SKIP.silent());
    let mut out = String::new();

    handle_serror(
        &TrapContext::new(&machine, &config, &state),
        &numbered_frame(),
        &mut out,
    );

    assert_eq!(out, "");
}

#[test]
#[should_panic(expected = "reboot")]
fn fatal_serror_reboots() {
    let machine = data_abort_at(0x1000);
    let config = config().with_serror(SErrorPolicy::Fatal);
    let state = CpuTrapState::new();
    TrapContext::new(&machine, &config, &state)
        .serror_trap(&numbered_frame(), &mut String::new());
}

#[test]
fn init_at_el1() {
    let machine = MockMachine::new();
    machine.set(SysReg::CurrentEl, 0x04);
    let state = CpuTrapState::new();

    init_current_cpu(&machine, &config(), &state).unwrap();

    assert_eq!(
        machine.writes(),
        [(SysReg::VbarEl1, 0xa000), (SysReg::Daif, 0)]
    );
    assert!(state.is_initialized());
}

#[test]
fn init_at_el2_hosts_guest() {
    let machine = MockMachine::new();
    machine.set(SysReg::CurrentEl, 0x08);
    let state = CpuTrapState::new();

    init_current_cpu(&machine, &config(), &state).unwrap();

    assert_eq!(machine.get(SysReg::HcrEl2), 0x324_8800_0038);
    assert_eq!(machine.get(SysReg::VbarEl12), 0xb000);
    assert_eq!(machine.barriers(), [Barrier::Isb]);
}

#[test]
fn init_twice_touches_nothing() {
    let machine = MockMachine::new();
    let state = CpuTrapState::new();
    init_current_cpu(&machine, &config(), &state).unwrap();
    let writes = machine.writes();

    assert_eq!(
        init_current_cpu(&machine, &config(), &state),
        Err(Error::AlreadyInitialized)
    );
    assert_eq!(machine.writes(), writes);
}

#[test]
fn shutdown_masks_interrupts() {
    let machine = MockMachine::new();
    let state = CpuTrapState::new();
    init_current_cpu(&machine, &config(), &state).unwrap();

    shutdown_current_cpu(&machine, &state);

    let daif = Daif::from_bits_truncate(machine.get(SysReg::Daif));
    assert_eq!(daif, Daif::A | Daif::I | Daif::F);
    assert!(!daif.contains(Daif::D));
    assert!(!state.is_initialized());
    assert_eq!(init_current_cpu(&machine, &config(), &state), Ok(()));
}

#[test]
fn trap_on_second_die_uses_own_state() {
    let machine = data_abort_at(0x1000);
    machine.set(SysReg::MpidrEl1, 0x8001_0a03);
    let config = config();
    let id = CpuId::try_from(83).unwrap();

    with_current_cpu(&machine, &config, |ctx| {
        assert!(core::ptr::eq(ctx.state, cpu::trap_state(id)));
        assert!(!core::ptr::eq(ctx.state, cpu::trap_state(CpuId::bsp())));
    });
}

#[test]
fn trap_on_unmapped_cpu_is_unguarded() {
    let machine = data_abort_at(0x1000);
    // Cluster 16 is past the mapped layout.
    machine.set(SysReg::MpidrEl1, 0x8001_1000);
    let config = config();

    let outcome = with_current_cpu(&machine, &config, |ctx| {
        assert!((0..cpu::MAX_CPUS).all(|id| {
            let id = CpuId::try_from(id).unwrap();
            !core::ptr::eq(ctx.state, cpu::trap_state(id))
        }));
        assert_eq!(ctx.state.guard(), Guard::OFF);
        handle_sync(ctx, &mut numbered_frame(), &mut String::new())
    });

    assert_eq!(outcome, SyncOutcome::Fatal);
    assert!(!machine.was_written(SysReg::ElrEl1));
}
