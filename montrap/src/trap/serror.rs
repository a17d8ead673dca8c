// SPDX-License-Identifier: MPL-2.0

use core::fmt::Write;

use log::warn;

use super::{frame::TrapFrame, report::report, syndrome::Origin, TrapContext};
use crate::{config::SErrorPolicy, hw::Machine};

/// How an SError ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SErrorOutcome {
    /// The interrupted context resumes.
    Resumed,
    /// The CPU must be rebooted.
    Fatal,
}

/// Handles an SError interrupt according to the configured policy.
pub fn handle_serror<M: Machine>(
    ctx: &TrapContext<'_, M>,
    frame: &TrapFrame,
    out: &mut impl Write,
) -> SErrorOutcome {
    let silent = ctx.state.guard().is_silent();

    if !silent {
        let _ = writeln!(out, "Exception: SError");
    }
    ctx.machine.sync_barriers();
    if !silent {
        let _ = report(ctx.machine, ctx.config, frame, Origin::Direct, out);
    }

    match ctx.config.serror {
        SErrorPolicy::Report => SErrorOutcome::Resumed,
        SErrorPolicy::Fatal => {
            warn!("SError is fatal by policy");
            SErrorOutcome::Fatal
        }
    }
}
