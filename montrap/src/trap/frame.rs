// SPDX-License-Identifier: MPL-2.0

/// The general registers saved by the exception trampoline.
///
/// The trampoline pushes `x0`..`x30` and one padding slot, then passes the
/// frame address to the handler. The layout is shared with assembly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    /// `x0`..`x30`.
    pub x: [u64; 31],
    _pad: u64,
}

/// The size of [`TrapFrame`], which is also the distance between the frame
/// and the stack pointer at the time of the trap.
pub const TRAP_FRAME_SIZE: usize = 256;

const _: () = assert!(core::mem::size_of::<TrapFrame>() == TRAP_FRAME_SIZE);

/// The index of the link register.
pub const LR: usize = 30;

impl TrapFrame {
    /// Creates a frame with the given general registers.
    pub const fn new(x: [u64; 31]) -> Self {
        Self { x, _pad: 0 }
    }

    /// Returns the link register.
    pub fn lr(&self) -> u64 {
        self.x[LR]
    }

    /// Writes general register `index`, where 31 names the zero register
    /// and discards the value.
    pub fn set_reg(&mut self, index: usize, value: u64) {
        if let Some(reg) = self.x.get_mut(index) {
            *reg = value;
        }
    }

    /// Returns the stack pointer of the interrupted context.
    pub fn stack_pointer(&self) -> u64 {
        self as *const Self as u64 + TRAP_FRAME_SIZE as u64
    }
}
