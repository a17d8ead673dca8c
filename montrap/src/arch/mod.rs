// SPDX-License-Identifier: MPL-2.0

//! Platform-specific code.
//!
//! The trap entry points and the register-backed [`Machine`] only exist on
//! bare-metal AArch64. Elsewhere the crate builds for host-side tests.
//!
//! [`Machine`]: crate::hw::Machine

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(all(target_arch = "aarch64", target_os = "none"))] {
        pub mod aarch64;
        pub use self::aarch64::*;
    }
}
