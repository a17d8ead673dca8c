// SPDX-License-Identifier: MPL-2.0

//! Textual descriptions of processor modes, exception levels and exception
//! classes, used when reporting traps.
//!
//! The tables are sorted by code so that lookups can binary search them.
//! Codes missing from a table have a fixed fallback text.

/// The text for a mode or level code that has no entry.
pub const UNKNOWN_MODE: &str = "?";
/// The text for an exception class that has no entry.
pub const UNKNOWN_CLASS: &str = "unknown";

/// `SPSR.M[3:0]` of the regular exception levels.
const MODES: &[(u8, &str)] = &[
    (0x00, "EL0t"),
    (0x04, "EL1t"),
    (0x05, "EL1h"),
    (0x08, "EL2t"),
    (0x09, "EL2h"),
];

/// `SPSR.M[3:0]` of the guarded levels.
const GUARDED_MODES: &[(u8, &str)] = &[
    (0x00, "GL0t"),
    (0x04, "GL1t"),
    (0x05, "GL1h"),
    (0x08, "GL2t"),
    (0x09, "GL2h"),
];

const LEVELS: &[(u64, &str)] = &[(0x04, "EL1"), (0x08, "EL2")];

const GUARDED_LEVELS: &[(u64, &str)] = &[(0x04, "GL1"), (0x08, "GL2")];

/// `ESR.EC`.
const EXCEPTION_CLASSES: &[(u8, &str)] = &[
    (0x00, "unknown"),
    (0x01, "wf*"),
    (0x03, "c15 mcr/mrc"),
    (0x04, "c15 mcrr/mrrc"),
    (0x05, "c14 mcr/mrc"),
    (0x06, "ldc/stc"),
    (0x07, "FP off"),
    (0x08, "VMRS access"),
    (0x09, "PAC off"),
    (0x0a, "ld/st64b"),
    (0x0c, "c14 mrrc"),
    (0x0d, "branch target"),
    (0x0e, "illegal state"),
    (0x11, "svc in a32"),
    (0x12, "hvc in a32"),
    (0x13, "smc in a32"),
    (0x15, "svc in a64"),
    (0x16, "hvc in a64"),
    (0x17, "smc in a64"),
    (0x18, "other mcr/mrc/sys"),
    (0x19, "SVE off"),
    (0x1a, "eret"),
    (0x1c, "PAC failure"),
    (0x20, "instruction abort (lower)"),
    (0x21, "instruction abort (current)"),
    (0x22, "pc misaligned"),
    (0x24, "data abort (lower)"),
    (0x25, "data abort (current)"),
    (0x26, "sp misaligned"),
    (0x28, "FP exception (a32)"),
    (0x2c, "FP exception (a64)"),
    (0x2f, "SError"),
    (0x30, "BP (lower)"),
    (0x31, "BP (current)"),
    (0x32, "step (lower)"),
    (0x33, "step (current)"),
    (0x34, "watchpoint (lower)"),
    (0x35, "watchpoint (current)"),
    (0x38, "bkpt (a32)"),
    (0x3a, "vector catch (a32)"),
    (0x3c, "brk (a64)"),
];

fn lookup<K: Ord + Copy>(table: &[(K, &'static str)], key: K) -> Option<&'static str> {
    table
        .binary_search_by_key(&key, |&(code, _)| code)
        .ok()
        .map(|index| table[index].1)
}

/// Describes the mode an exception was taken from.
///
/// `guarded` selects the guarded-level names.
pub fn mode_name(mode: u8, guarded: bool) -> &'static str {
    let table = if guarded { GUARDED_MODES } else { MODES };
    lookup(table, mode & 0xf).unwrap_or(UNKNOWN_MODE)
}

/// Describes a raw `CurrentEL` value.
pub fn level_name(current_el: u64, guarded: bool) -> &'static str {
    let table = if guarded { GUARDED_LEVELS } else { LEVELS };
    lookup(table, current_el).unwrap_or(UNKNOWN_MODE)
}

/// Describes an exception class. Only the low 6 bits of `class` are used.
pub fn class_name(class: u8) -> &'static str {
    lookup(EXCEPTION_CLASSES, class & 0x3f).unwrap_or(UNKNOWN_CLASS)
}
