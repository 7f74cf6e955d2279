//! Automata for the analysis pipeline.
//!
//! The compiler turns a pattern into an ε-NFA whose transition ordering
//! encodes backtracking priority; ε-elimination then produces an ordered
//! NFA the ambiguity checker consumes.

mod compiler;
mod ordered;

pub use compiler::{compile_eps_nfa, referenced_chars};
pub use ordered::{from_eps_nfa, CtxState, OrderedNfa, PrevKind};

use smallvec::SmallVec;

use crate::chars::IChar;
use crate::regexp::FlagSet;

/// A state identifier: an index into the NFA's state arena.
pub type StateId = u32;

/// Zero-width checks resolved during ε-elimination against the character
/// context on both sides of the position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssertKind {
    LineBegin,
    LineEnd,
    WordBoundary,
    NotWordBoundary,
}

/// The transition out of one ε-NFA state. Each state carries exactly one;
/// the accept state carries an empty `Eps`.
#[derive(Clone, Debug)]
pub enum Transition {
    /// Alternatives in backtracking order; the first is tried first.
    Eps(SmallVec<[StateId; 2]>),
    /// Zero-width check, then `target`.
    Assert(AssertKind, StateId),
    /// Consume one character from any of the listed alphabet atoms.
    Consume(Vec<usize>, StateId),
}

/// An ε-NFA over a refined alphabet.
#[derive(Clone, Debug)]
pub struct EpsNfa {
    /// Disjoint alphabet atoms; `Consume` transitions index into this.
    pub alphabet: Vec<IChar>,
    /// State arena; a `StateId` indexes here.
    pub states: Vec<Transition>,
    pub init: StateId,
    pub accept: StateId,
    pub flags: FlagSet,
}

impl EpsNfa {
    pub fn state(&self, id: StateId) -> &Transition {
        &self.states[id as usize]
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}
