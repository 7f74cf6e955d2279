//! Interval sets tagged with the properties zero-width assertions need.

use std::fmt;

use crate::chars::CharSet;
use crate::unicode;

/// A character class together with two orthogonal bits: whether every member
/// is a line terminator and whether every member is a word character. The
/// bits let the ordered-NFA construction resolve `^`, `$` and `\b` against
/// the classes adjacent to a position instead of against single characters.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IChar {
    pub set: CharSet,
    pub line_terminator: bool,
    pub word: bool,
}

impl fmt::Debug for IChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IChar({:?}", self.set)?;
        if self.line_terminator {
            write!(f, ", lt")?;
        }
        if self.word {
            write!(f, ", word")?;
        }
        write!(f, ")")
    }
}

impl IChar {
    pub fn new(set: CharSet) -> Self {
        Self {
            set,
            line_terminator: false,
            word: false,
        }
    }

    /// The full scalar domain for the given mode.
    pub fn any(unicode_mode: bool) -> Self {
        let max = if unicode_mode {
            crate::chars::RUNE_MAX
        } else {
            super::interval::BMP_MAX
        };
        Self::new(CharSet::empty().complement(max))
    }

    /// ECMA-262 line terminators.
    pub fn line_terminator() -> Self {
        Self {
            set: unicode::line_terminators(),
            line_terminator: true,
            word: false,
        }
    }

    /// ECMA-262 word characters (`[0-9A-Za-z_]`).
    pub fn word() -> Self {
        Self {
            set: unicode::word_chars(),
            line_terminator: false,
            word: true,
        }
    }

    /// The `.` class: everything except line terminators unless `dot_all`.
    pub fn dot(dot_all: bool, unicode_mode: bool) -> Self {
        let any = Self::any(unicode_mode);
        if dot_all {
            any
        } else {
            Self::new(any.set.difference(&unicode::line_terminators()))
        }
    }

    /// The smallest member; the canonical representative used once the
    /// alphabet is mapped down to plain characters.
    pub fn head(&self) -> Option<char> {
        self.set.first()
    }

    /// Applies the case-fold conversions: each slice of the set that falls
    /// in a conversion's domain is mapped by the conversion's offset.
    pub fn canonicalize(&self, unicode_mode: bool) -> IChar {
        let mut out = self.set.clone();
        for &(lo, hi, offset) in unicode::fold_ranges(unicode_mode) {
            let domain = CharSet::range(lo, hi);
            let hit = self.set.intersect(&domain);
            if !hit.is_empty() {
                out = out.difference(&hit).union(&hit.shift(offset));
            }
        }
        IChar {
            set: out,
            line_terminator: self.line_terminator,
            word: self.word,
        }
    }

    /// Recomputes the property bits from the underlying set. An atom is
    /// flagged only when it lies entirely inside the property's class, which
    /// holds for alphabet atoms because the refinement splits on both sets.
    pub fn with_recomputed_bits(self) -> IChar {
        let line_terminator =
            !self.set.is_empty() && self.set.is_subset_of(&unicode::line_terminators());
        let word = !self.set.is_empty() && self.set.is_subset_of(&unicode::word_chars());
        IChar {
            set: self.set,
            line_terminator,
            word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_ascii() {
        let c = IChar::new(CharSet::from_pairs(&[('a', 'c'), ('A', 'A')]));
        let canon = c.canonicalize(false);
        assert!(canon.set.contains('A'));
        assert!(canon.set.contains('B'));
        assert!(canon.set.contains('C'));
        assert!(!canon.set.contains('a'));
    }

    #[test]
    fn test_canonicalize_preserves_non_cased() {
        let c = IChar::new(CharSet::from_pairs(&[('0', '9'), ('!', '!')]));
        let canon = c.canonicalize(false);
        assert_eq!(canon.set, c.set);
    }

    #[test]
    fn test_dot_excludes_line_terminators() {
        let dot = IChar::dot(false, false);
        assert!(dot.set.contains('a'));
        assert!(!dot.set.contains('\n'));
        assert!(!dot.set.contains('\u{2028}'));

        let dot_all = IChar::dot(true, false);
        assert!(dot_all.set.contains('\n'));
    }

    #[test]
    fn test_recomputed_bits() {
        let nl = IChar::new(CharSet::singleton('\n')).with_recomputed_bits();
        assert!(nl.line_terminator);
        assert!(!nl.word);

        let w = IChar::new(CharSet::range('a', 'f')).with_recomputed_bits();
        assert!(w.word);

        let mixed = IChar::new(CharSet::from_pairs(&[('a', 'a'), ('!', '!')]))
            .with_recomputed_bits();
        assert!(!mixed.word);
    }
}
