//! Alphabet refinement.

use crate::chars::{CharSet, IChar};

/// A set of pairwise-disjoint [`IChar`]s covering the characters a pattern
/// can consume. Adding a class re-splits existing members so disjointness is
/// preserved; afterwards every class the pattern references is an exact
/// union of members ("atoms").
///
/// Members are kept sorted by their smallest code point, so atom indices are
/// stable for a given insertion history.
#[derive(Clone, Debug, Default)]
pub struct ICharSet {
    members: Vec<CharSet>,
}

impl ICharSet {
    /// Starts from an explicit domain so the refinement always partitions
    /// it. Under the `i` flag the caller passes the canonicalized domain.
    pub fn new(domain: &CharSet) -> Self {
        let mut set = Self {
            members: Vec::new(),
        };
        set.add(domain);
        set
    }

    /// Starts from the full scalar domain.
    pub fn any(unicode_mode: bool) -> Self {
        Self::new(&IChar::any(unicode_mode).set)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Splits the refinement against `c`: every member `d` becomes `d∩c`
    /// and `d∖c` (empty pieces dropped), and any remainder of `c` outside
    /// the current members becomes a new member.
    pub fn add(&mut self, c: &CharSet) {
        if c.is_empty() {
            return;
        }
        let mut next = Vec::with_capacity(self.members.len() + 1);
        let mut leftover = c.clone();
        for d in &self.members {
            let (both, d_only, _) = d.partition(&leftover);
            if !both.is_empty() {
                next.push(both);
            }
            if !d_only.is_empty() {
                next.push(d_only);
            }
            leftover = leftover.difference(d);
        }
        if !leftover.is_empty() {
            next.push(leftover);
        }
        next.sort_unstable();
        self.members = next;
    }

    /// The atoms of `c`: the indices of members entirely inside `c`. When
    /// `c` was previously `add`ed, the union of the returned atoms is `c`.
    pub fn refine(&self, c: &CharSet) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_subset_of(c))
            .map(|(i, _)| i)
            .collect()
    }

    /// All atom indices.
    pub fn all(&self) -> Vec<usize> {
        (0..self.members.len()).collect()
    }

    pub fn member(&self, i: usize) -> &CharSet {
        &self.members[i]
    }

    /// Freezes the refinement into the alphabet: one [`IChar`] per atom,
    /// with the line-terminator/word bits recomputed per atom.
    pub fn into_alphabet(self) -> Vec<IChar> {
        self.members
            .into_iter()
            .map(|set| IChar::new(set).with_recomputed_bits())
            .collect()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_class() -> impl Strategy<Value = CharSet> {
        proptest::collection::vec((proptest::char::range('\u{0}', '\u{2FF}'), 0u8..12), 1..4).prop_map(|pairs| {
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

    proptest! {
        #[test]
        fn prop_refine_union_is_the_class(classes in proptest::collection::vec(arb_class(), 1..5)) {
            let mut set = ICharSet::any(false);
            for c in &classes {
                set.add(c);
            }
            for c in &classes {
                let mut union = CharSet::empty();
                for i in set.refine(c) {
                    union = union.union(set.member(i));
                }
                prop_assert_eq!(&union, c);
            }
        }

        #[test]
        fn prop_members_pairwise_disjoint(classes in proptest::collection::vec(arb_class(), 1..5)) {
            let mut set = ICharSet::any(false);
            for c in &classes {
                set.add(c);
            }
            for i in 0..set.len() {
                for j in (i + 1)..set.len() {
                    prop_assert!(set.member(i).intersect(set.member(j)).is_empty());
                }
            }
        }
    }
}
