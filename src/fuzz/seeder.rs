//! Static seeding for the genetic search.
//!
//! Walks the compiled IR and emits the obvious interesting inputs: the
//! pattern's literal parts, edge characters of every class a `read` can
//! consume, a mismatch character the pattern never reads, the empty
//! string, and repeat-shaped combinations of those. The repeat seeds carry
//! a scalable `Repeat` element so a seed that already backtracks heavily
//! can be escalated straight into an attack.

use crate::backtrack::{Inst, Program, ReadKind};
use crate::chars::{CharSet, RUNE_MAX};
use crate::fuzz::{Element, FString};

/// Pump factor of the repeat-shaped seeds: `c^(1+64n) d` at `n = 1` stays
/// inside the default seed-size budget.
const SEED_REPEAT: usize = 64;

/// Characters worth trying against the program's `read` instructions, in a
/// stable order: class edges first-seen first, then one character no
/// non-inverted `read` accepts.
pub fn interesting_chars(prog: &Program) -> Vec<char> {
    let mut out: Vec<char> = Vec::new();
    let mut matching = CharSet::empty();
    let mut push = |c: char, out: &mut Vec<char>| {
        if !out.contains(&c) {
            out.push(c);
        }
    };
    for block in &prog.blocks {
        for inst in &block.insts {
            let kind = match inst {
                Inst::Read(kind) | Inst::ReadBack(kind) => kind,
                _ => continue,
            };
            match kind {
                ReadKind::Char(c) => {
                    push(*c, &mut out);
                    matching = matching.union(&CharSet::singleton(*c));
                }
                ReadKind::Class { set, invert } => {
                    for &(lo, hi) in set.ranges().iter().take(4) {
                        push(lo, &mut out);
                        if hi != lo {
                            push(hi, &mut out);
                        }
                    }
                    if *invert {
                        if let Some(c) = set.complement(RUNE_MAX).first() {
                            push(c, &mut out);
                        }
                    } else {
                        matching = matching.union(set);
                    }
                }
                ReadKind::Ref(_) => {}
            }
        }
    }
    // A character outside every positive read makes matches fail at a
    // chosen point, which is what forces backtracking to unwind fully.
    if let Some(mismatch) = ('!'..='~').find(|&c| !matching.contains(c)) {
        push(mismatch, &mut out);
    }
    out
}

/// Builds the initial seed set, bounded by `seed_limit` candidates whose
/// expansions stay within `max_seed_size` characters.
pub fn seeds(
    prog: &Program,
    parts: &[Vec<char>],
    seed_limit: usize,
    max_seed_size: usize,
) -> Vec<FString> {
    let chars = interesting_chars(prog);
    let mut out: Vec<FString> = Vec::new();
    let mut push = |seed: FString, out: &mut Vec<FString>| {
        if out.len() < seed_limit && seed.to_ustring().len() <= max_seed_size {
            out.push(seed);
        }
    };

    push(FString::from_chars(&[]), &mut out);
    for part in parts {
        push(FString::from_chars(part), &mut out);
    }
    for &c in &chars {
        push(FString::from_chars(&[c]), &mut out);
    }
    // Repeat-shaped seeds: a run of one character, optionally followed by
    // a different one. These are the classic slow-input shapes.
    for &c in &chars {
        push(
            FString::new(1, vec![Element::Wrap(c), Element::Repeat(SEED_REPEAT, 1)]),
            &mut out,
        );
        for &d in &chars {
            if c == d {
                continue;
            }
            push(
                FString::new(
                    1,
                    vec![
                        Element::Wrap(c),
                        Element::Repeat(SEED_REPEAT, 1),
                        Element::Wrap(d),
                    ],
                ),
                &mut out,
            );
        }
    }
    // Part-edge combinations catch patterns whose slow region needs a
    // literal lead-in.
    for part in parts {
        for &c in &chars {
            let mut seed = part.clone();
            seed.push(c);
            push(FString::from_chars(&seed), &mut out);
            let mut seed = vec![c];
            seed.extend_from_slice(part);
            push(FString::from_chars(&seed), &mut out);
        }
    }
    out
}
