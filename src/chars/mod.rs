//! Character domain: code points, interval sets, refined alphabets.
//!
//! Matching is defined over Unicode scalar values. Character classes are
//! represented as canonical interval sets ([`CharSet`]), optionally tagged
//! with the two properties assertions care about ([`IChar`]), and the
//! pattern's full alphabet is kept as a disjoint refinement ([`ICharSet`])
//! so that every consuming transition ranges over whole atoms.

mod ichar;
mod icharset;
mod interval;

pub use ichar::IChar;
pub use icharset::ICharSet;
pub use interval::{CharSet, BMP_MAX, RUNE_MAX};

/// Upper bound of the scalar domain for the given mode.
pub fn mode_max(unicode_mode: bool) -> char {
    if unicode_mode {
        RUNE_MAX
    } else {
        BMP_MAX
    }
}
