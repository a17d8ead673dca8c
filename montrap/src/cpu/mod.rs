// SPDX-License-Identifier: MPL-2.0

//! CPU identity and the per-CPU trap state.
//!
//! Guards and fault counters are scoped to a CPU: a guarded probe on one
//! core must not be resolved, or consumed, by a fault taken on another one.
//! Each CPU therefore owns a [`CpuTrapState`], found by its [`CpuId`] and
//! handed explicitly to the trap handlers.

use core::sync::atomic::{compiler_fence, AtomicBool, AtomicU32, AtomicUsize, Ordering};

use bit_field::BitField;
use log::warn;

use crate::{
    hw::{Machine, SysReg},
    prelude::*,
    trap::Guard,
    Error,
};

/// Clusters that the affinity mapping accounts for. Multi-die parts number
/// the clusters of the second die after those of the first.
const MAX_CLUSTERS: usize = 16;

/// Cores per cluster that the affinity mapping accounts for.
const CORES_PER_CLUSTER: usize = 8;

/// The maximum number of CPUs.
pub const MAX_CPUS: usize = MAX_CLUSTERS * CORES_PER_CLUSTER;

/// The ID of a CPU in the system.
///
/// IDs are dense, starting from 0 and less than [`MAX_CPUS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuId(u32);

impl CpuId {
    /// Returns the CPU ID of the bootstrap processor (BSP).
    pub const fn bsp() -> Self {
        CpuId(0)
    }

    /// Derives the ID from an `MPIDR_EL1` value.
    ///
    /// `Aff0` is the core within its cluster and `Aff1` the cluster.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgs` for an affinity outside of the mapped
    /// layout. Such a CPU has no trap state of its own.
    pub fn from_mpidr(mpidr: u64) -> Result<Self> {
        let core = mpidr.get_bits(0..8) as usize;
        let cluster = mpidr.get_bits(8..16) as usize;
        if core >= CORES_PER_CLUSTER || cluster >= MAX_CLUSTERS {
            return Err(Error::InvalidArgs);
        }
        Self::try_from(cluster * CORES_PER_CLUSTER + core)
    }

    /// Returns the ID of the CPU executing this code.
    pub fn current<M: Machine>(machine: &M) -> Result<Self> {
        Self::from_mpidr(machine.read(SysReg::MpidrEl1))
    }

    /// Converts the CPU ID to an `usize`.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for CpuId {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        if value < MAX_CPUS {
            Ok(CpuId(value as u32))
        } else {
            Err(Error::InvalidArgs)
        }
    }
}

impl From<CpuId> for usize {
    fn from(id: CpuId) -> usize {
        id.as_usize()
    }
}

/// The trap state owned by one CPU.
#[derive(Debug)]
pub struct CpuTrapState {
    guard: AtomicU32,
    faults: AtomicUsize,
    initialized: AtomicBool,
}

impl CpuTrapState {
    /// Creates a state with no guard armed and no faults recorded.
    pub const fn new() -> Self {
        Self {
            guard: AtomicU32::new(Guard::OFF.to_bits()),
            faults: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Returns the armed guard.
    pub fn guard(&self) -> Guard {
        Guard::from_bits(self.guard.load(Ordering::Acquire))
    }

    /// Arms or disarms the guard.
    ///
    /// Prefer [`Self::probe`], which also checks the fault counter.
    pub fn set_guard(&self, guard: Guard) {
        self.guard.store(guard.to_bits(), Ordering::Release);
    }

    /// Returns how many synchronous faults have been recovered on this CPU.
    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::Acquire)
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs `op` with `guard` armed.
    ///
    /// Returns `Err(Error::Faulted)` if a fault was recovered while `op` ran.
    /// With [`crate::trap::GuardKind::Mark`] or `Return` the poisoned value
    /// is therefore never handed back.
    ///
    /// # Errors
    ///
    /// Fails with `Error::InvalidArgs` if `guard` is not armed, and with
    /// `Error::GuardBusy` if another guard is already armed on this CPU.
    /// Only one guarded region may be active per CPU.
    pub fn probe<R>(&self, guard: Guard, op: impl FnOnce() -> R) -> Result<R> {
        if !guard.is_armed() {
            return Err(Error::InvalidArgs);
        }
        if self.guard().is_armed() {
            warn!("nested guarded probe refused, {:?} is active", self.guard());
            return Err(Error::GuardBusy);
        }

        let before = self.fault_count();
        self.set_guard(guard);
        compiler_fence(Ordering::SeqCst);
        let value = op();
        compiler_fence(Ordering::SeqCst);
        // A `Return` guard has already disarmed itself if it fired.
        self.set_guard(Guard::OFF);

        if self.fault_count() == before {
            Ok(value)
        } else {
            Err(Error::Faulted)
        }
    }

    /// Marks the CPU as initialized, failing if it already was.
    pub(crate) fn mark_initialized(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyInitialized);
        }
        Ok(())
    }

    pub(crate) fn mark_shut_down(&self) {
        self.initialized.store(false, Ordering::Release);
    }

    /// Returns whether exception handling is set up on this CPU.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

impl Default for CpuTrapState {
    fn default() -> Self {
        Self::new()
    }
}

static CPU_TRAP_STATES: [CpuTrapState; MAX_CPUS] = [const { CpuTrapState::new() }; MAX_CPUS];

/// Returns the trap state of `cpu`.
pub fn trap_state(cpu: CpuId) -> &'static CpuTrapState {
    &CPU_TRAP_STATES[usize::from(cpu)]
}
