//! Canonical interval sets of Unicode scalar values.
//!
//! A [`CharSet`] stores sorted, coalesced, inclusive ranges of `char`. The
//! surrogate block (U+D800..U+DFFF) is not representable as `char`, so the
//! two scalar halves around it are treated as adjacent: `\u{D7FF}` and
//! `\u{E000}` coalesce into one stored range.

use std::fmt;

/// Maximum Unicode code point value.
pub const RUNE_MAX: char = '\u{10FFFF}';

/// End of the Basic Multilingual Plane; complement bound in non-unicode mode.
pub const BMP_MAX: char = '\u{FFFF}';

/// Successor in scalar-value order, skipping the surrogate gap.
fn succ(c: char) -> Option<char> {
    if c == '\u{D7FF}' {
        Some('\u{E000}')
    } else if c == RUNE_MAX {
        None
    } else {
        char::from_u32(c as u32 + 1)
    }
}

/// Predecessor in scalar-value order, skipping the surrogate gap.
fn pred(c: char) -> Option<char> {
    if c == '\u{E000}' {
        Some('\u{D7FF}')
    } else if c == '\0' {
        None
    } else {
        char::from_u32(c as u32 - 1)
    }
}

/// A canonical set of Unicode scalar values stored as inclusive ranges.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CharSet {
    ranges: Vec<(char, char)>,
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharSet[")?;
        for (i, (lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if lo == hi {
                write!(f, "{:?}", lo)?;
            } else {
                write!(f, "{:?}-{:?}", lo, hi)?;
            }
        }
        write!(f, "]")
    }
}

impl CharSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// A single code point.
    pub fn singleton(c: char) -> Self {
        Self {
            ranges: vec![(c, c)],
        }
    }

    /// An inclusive range `lo..=hi`. Empty when `lo > hi`.
    pub fn range(lo: char, hi: char) -> Self {
        if lo > hi {
            return Self::empty();
        }
        Self {
            ranges: vec![(lo, hi)],
        }
    }

    /// Builds a canonical set from arbitrary (possibly overlapping,
    /// unsorted) inclusive pairs.
    pub fn from_pairs(pairs: &[(char, char)]) -> Self {
        let mut sorted: Vec<(char, char)> = pairs
            .iter()
            .copied()
            .filter(|(lo, hi)| lo <= hi)
            .collect();
        sorted.sort_unstable();
        let mut ranges: Vec<(char, char)> = Vec::with_capacity(sorted.len());
        for (lo, hi) in sorted {
            match ranges.last_mut() {
                Some((_, prev_hi)) if lo <= *prev_hi || Some(lo) == succ(*prev_hi) => {
                    if hi > *prev_hi {
                        *prev_hi = hi;
                    }
                }
                _ => ranges.push((lo, hi)),
            }
        }
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The stored inclusive ranges, sorted and coalesced.
    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    /// The smallest code point, if any.
    pub fn first(&self) -> Option<char> {
        self.ranges.first().map(|&(lo, _)| lo)
    }

    /// Number of code points in the set.
    pub fn count(&self) -> u32 {
        self.ranges
            .iter()
            .map(|&(lo, hi)| {
                let mut n = hi as u32 - lo as u32 + 1;
                // Ranges spanning the surrogate gap never contain surrogates.
                if (lo as u32) < 0xD800 && (hi as u32) > 0xDFFF {
                    n -= 0x800;
                }
                n
            })
            .sum()
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    std::cmp::Ordering::Greater
                } else if c > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn union(&self, other: &CharSet) -> CharSet {
        let mut pairs = self.ranges.clone();
        pairs.extend_from_slice(&other.ranges);
        CharSet::from_pairs(&pairs)
    }

    pub fn intersect(&self, other: &CharSet) -> CharSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                out.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharSet { ranges: out }
    }

    /// Complement within `'\0'..=max`.
    pub fn complement(&self, max: char) -> CharSet {
        let mut out = Vec::new();
        let mut cursor = Some('\0');
        for &(lo, hi) in &self.ranges {
            if lo > max {
                break;
            }
            if let Some(c) = cursor {
                if c < lo {
                    if let Some(gap_hi) = pred(lo) {
                        out.push((c, gap_hi.min(max)));
                    }
                }
            }
            cursor = succ(hi.min(max));
            if hi >= max {
                cursor = None;
            }
        }
        if let Some(c) = cursor {
            if c <= max {
                out.push((c, max));
            }
        }
        CharSet { ranges: out }
    }

    pub fn difference(&self, other: &CharSet) -> CharSet {
        if other.is_empty() {
            return self.clone();
        }
        self.intersect(&other.complement(RUNE_MAX))
    }

    /// Splits `self` and `other` into (both, only self, only other).
    pub fn partition(&self, other: &CharSet) -> (CharSet, CharSet, CharSet) {
        (
            self.intersect(other),
            self.difference(other),
            other.difference(self),
        )
    }

    /// True when every member of `self` is in `other`.
    pub fn is_subset_of(&self, other: &CharSet) -> bool {
        self.difference(other).is_empty()
    }

    /// Shifts every code point by `offset`, dropping points that leave the
    /// valid scalar range. Used by case-fold conversions whose domains never
    /// straddle the surrogate gap.
    pub fn shift(&self, offset: i32) -> CharSet {
        let mut pairs = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            let lo = char::from_u32((lo as i64 + offset as i64) as u32);
            let hi = char::from_u32((hi as i64 + offset as i64) as u32);
            if let (Some(lo), Some(hi)) = (lo, hi) {
                pairs.push((lo, hi));
            }
        }
        CharSet::from_pairs(&pairs)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_coalesces() {
        let s = CharSet::from_pairs(&[('a', 'c'), ('b', 'd')]);
        assert_eq!(s.ranges(), &[('a', 'd')]);

        let s = CharSet::from_pairs(&[('a', 'b'), ('c', 'd')]);
        assert_eq!(s.ranges(), &[('a', 'd')], "adjacent ranges merge");

        let s = CharSet::from_pairs(&[('a', 'b'), ('d', 'e')]);
        assert_eq!(s.ranges(), &[('a', 'b'), ('d', 'e')]);
    }

    #[test]
    fn test_contains() {
        let s = CharSet::from_pairs(&[('a', 'f'), ('x', 'z')]);
        assert!(s.contains('a'));
        assert!(s.contains('f'));
        assert!(s.contains('y'));
        assert!(!s.contains('g'));
        assert!(!s.contains('A'));
    }

    #[test]
    fn test_intersect() {
        let a = CharSet::from_pairs(&[('a', 'm')]);
        let b = CharSet::from_pairs(&[('g', 'z')]);
        assert_eq!(a.intersect(&b).ranges(), &[('g', 'm')]);

        let c = CharSet::from_pairs(&[('0', '9')]);
        assert!(a.intersect(&c).is_empty());
    }

    #[test]
    fn test_complement_skips_surrogates() {
        let s = CharSet::singleton('b');
        let c = s.complement(RUNE_MAX);
        assert!(!c.contains('b'));
        assert!(c.contains('a'));
        assert!(c.contains('c'));
        assert!(c.contains('\u{D7FF}'));
        assert!(c.contains('\u{E000}'));
        assert!(c.contains(RUNE_MAX));
    }

    #[test]
    fn test_complement_bmp_bound() {
        let s = CharSet::singleton('b');
        let c = s.complement('\u{FFFF}');
        assert!(c.contains('\u{FFFF}'));
        assert!(!c.contains('\u{10000}'));
    }

    #[test]
    fn test_difference() {
        let a = CharSet::from_pairs(&[('a', 'z')]);
        let b = CharSet::from_pairs(&[('m', 'p')]);
        let d = a.difference(&b);
        assert_eq!(d.ranges(), &[('a', 'l'), ('q', 'z')]);
    }

    #[test]
    fn test_partition_pieces_are_disjoint() {
        let a = CharSet::from_pairs(&[('a', 'm')]);
        let b = CharSet::from_pairs(&[('g', 'z')]);
        let (both, only_a, only_b) = a.partition(&b);
        assert!(both.intersect(&only_a).is_empty());
        assert!(both.intersect(&only_b).is_empty());
        assert!(only_a.intersect(&only_b).is_empty());
        assert_eq!(both.union(&only_a).union(&only_b), a.union(&b));
    }

    #[test]
    fn test_double_complement_roundtrip() {
        let a = CharSet::from_pairs(&[('b', 'f'), ('x', 'z')]);
        assert_eq!(a.complement(RUNE_MAX).complement(RUNE_MAX), a);
    }

    #[test]
    fn test_shift_ascii_case() {
        let lower = CharSet::range('a', 'z');
        let upper = lower.shift(-32);
        assert_eq!(upper.ranges(), &[('A', 'Z')]);
    }

    #[test]
    fn test_count() {
        assert_eq!(CharSet::range('a', 'z').count(), 26);
        assert_eq!(CharSet::singleton('x').count(), 1);
        // A full-domain complement excludes the 2048 surrogates.
        let all = CharSet::empty().complement(RUNE_MAX);
        assert_eq!(all.count(), 0x110000 - 0x800);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_charset() -> impl Strategy<Value = CharSet> {
        proptest::collection::vec((any::<char>(), 0u8..8), 0..6).prop_map(|pairs| {
            let ranges: Vec<(char, char)> = pairs
                .into_iter()
                .filter_map(|(lo, width)| {
                    let hi = char::from_u32(lo as u32 + width as u32)?;
                    Some((lo, hi))
                })
                .collect();
            CharSet::from_pairs(&ranges)
        })
    }

    fn assert_canonical(s: &CharSet) {
        let ranges = s.ranges();
        for (lo, hi) in ranges {
            assert!(lo <= hi, "empty range stored");
        }
        for w in ranges.windows(2) {
            assert!(w[0].1 < w[1].0, "unsorted or overlapping ranges");
            // Adjacent ranges (surrogate gap included) must have merged.
            let adjacent = w[1].0 as u32 - w[0].1 as u32 == 1
                || (w[0].1 == '\u{D7FF}' && w[1].0 == '\u{E000}');
            assert!(!adjacent, "uncoalesced adjacent ranges: {:?}", ranges);
        }
    }

    proptest! {
        #[test]
        fn prop_union_commutes(a in arb_charset(), b in arb_charset()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn prop_intersect_distributes_over_union(
            a in arb_charset(),
            b in arb_charset(),
            c in arb_charset(),
        ) {
            let left = a.intersect(&b.union(&c));
            let right = a.intersect(&b).union(&a.intersect(&c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_double_complement_is_identity(a in arb_charset()) {
            prop_assert_eq!(a.complement(RUNE_MAX).complement(RUNE_MAX), a);
        }

        #[test]
        fn prop_partition_pieces(a in arb_charset(), b in arb_charset()) {
            let (both, only_a, only_b) = a.partition(&b);
            prop_assert!(both.intersect(&only_a).is_empty());
            prop_assert!(both.intersect(&only_b).is_empty());
            prop_assert!(only_a.intersect(&only_b).is_empty());
            prop_assert_eq!(both.union(&only_a).union(&only_b), a.union(&b));
        }

        #[test]
        fn prop_results_stay_canonical(a in arb_charset(), b in arb_charset()) {
            assert_canonical(&a.union(&b));
            assert_canonical(&a.intersect(&b));
            assert_canonical(&a.difference(&b));
            assert_canonical(&a.complement(RUNE_MAX));
        }
    }
}
