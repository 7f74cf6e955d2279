//! Pattern AST → ε-NFA.
//!
//! Follows the classic fragment construction: every node compiles to an
//! `(init, accept)` pair of fresh states, and composition links fragment
//! accepts with ε-transitions. Priority lists encode greediness: a greedy
//! repetition tries its body before its exit, a non-greedy one the other
//! way around.
//!
//! Loop-backs re-enter a fresh choice state rather than the entry choice.
//! The ε-closure stops cycles by path, so re-listing the body behind the
//! loop-back is what lets two distinct ε-routes reach the same consume
//! state — the multiplicity a backtracking engine actually explores.

use smallvec::smallvec;

use crate::chars::{CharSet, IChar, ICharSet};
use crate::diagnostics::ErrorKind;
use crate::nfa::{AssertKind, EpsNfa, StateId, Transition};
use crate::regexp::{atom_class, FlagSet, Node, Pattern};
use crate::timeout::Timeout;

fn too_large() -> ErrorKind {
    ErrorKind::Unsupported("MultiNFA size is too large".to_string())
}

fn canon_set(set: &CharSet, flags: &FlagSet) -> CharSet {
    if flags.ignore_case {
        IChar::new(set.clone()).canonicalize(flags.unicode).set
    } else {
        set.clone()
    }
}

/// The union of all character classes the pattern names, canonicalized the
/// way the compiler canonicalizes atoms. The complement of this set is
/// where attack terminator characters come from.
pub fn referenced_chars(pattern: &Pattern) -> CharSet {
    let mut out = CharSet::empty();
    let mut stack = vec![&pattern.node];
    while let Some(node) = stack.pop() {
        if let Some(class) = atom_class(node, &pattern.flags) {
            // Dot references everything; skip it so the terminator choice
            // keys off the explicit classes only.
            if !matches!(node, Node::Dot) {
                out = out.union(&canon_set(&class.set, &pattern.flags));
            }
            continue;
        }
        match node {
            Node::Disjunction(children) | Node::Sequence(children) => {
                stack.extend(children.iter())
            }
            Node::Capture(_, child)
            | Node::NamedCapture(_, _, child)
            | Node::Group(child)
            | Node::Star(_, child)
            | Node::Plus(_, child)
            | Node::Question(_, child)
            | Node::Repeat(_, _, _, child)
            | Node::LookAhead(_, child)
            | Node::LookBehind(_, child) => stack.push(child),
            _ => {}
        }
    }
    out
}

/// Compiles a pattern into an ε-NFA, building the refined alphabet as a
/// side effect. Fails with `Unsupported` on constructs the automaton path
/// does not model and with `InvalidRegExp` on out-of-order bounds.
pub fn compile_eps_nfa(
    pattern: &Pattern,
    max_nfa_size: usize,
    timeout: &Timeout,
) -> Result<EpsNfa, ErrorKind> {
    let flags = pattern.flags;
    let domain = canon_set(&IChar::any(flags.unicode).set, &flags);

    let mut refinement = ICharSet::new(&domain);
    refinement.add(&canon_set(&IChar::line_terminator().set, &flags).intersect(&domain));
    refinement.add(&canon_set(&IChar::word().set, &flags).intersect(&domain));
    collect_classes(&pattern.node, &flags, &domain, &mut refinement);

    let mut builder = Builder {
        states: Vec::new(),
        refinement: &refinement,
        flags,
        domain: &domain,
        max_size: max_nfa_size,
        timeout,
    };

    let (init, accept) = builder.compile(&pattern.node)?;

    // Model "match anywhere": a missing `^` gets a non-greedy any-loop in
    // front, a missing `$` one behind.
    let init = if pattern.has_line_begin_at_begin() {
        init
    } else {
        builder.wrap_any_loop(init)?
    };
    let accept = if pattern.has_line_end_at_end() {
        accept
    } else {
        let new_accept = builder.alloc(Transition::Eps(smallvec![]))?;
        let choice = builder.wrap_any_loop(new_accept)?;
        builder.link(accept, choice);
        new_accept
    };

    tracing::debug!(
        states = builder.states.len(),
        atoms = refinement.len(),
        domain = domain.count(),
        "compiled eps-nfa"
    );

    Ok(EpsNfa {
        alphabet: refinement.clone().into_alphabet(),
        states: builder.states,
        init,
        accept,
        flags,
    })
}

fn collect_classes(node: &Node, flags: &FlagSet, domain: &CharSet, refinement: &mut ICharSet) {
    if let Some(class) = atom_class(node, flags) {
        refinement.add(&canon_set(&class.set, flags).intersect(domain));
        return;
    }
    match node {
        Node::Disjunction(children) | Node::Sequence(children) => {
            for c in children {
                collect_classes(c, flags, domain, refinement);
            }
        }
        Node::Capture(_, child)
        | Node::NamedCapture(_, _, child)
        | Node::Group(child)
        | Node::Star(_, child)
        | Node::Plus(_, child)
        | Node::Question(_, child)
        | Node::Repeat(_, _, _, child)
        | Node::LookAhead(_, child)
        | Node::LookBehind(_, child) => collect_classes(child, flags, domain, refinement),
        _ => {}
    }
}

struct Builder<'a> {
    states: Vec<Transition>,
    refinement: &'a ICharSet,
    flags: FlagSet,
    domain: &'a CharSet,
    max_size: usize,
    timeout: &'a Timeout,
}

impl Builder<'_> {
    fn alloc(&mut self, t: Transition) -> Result<StateId, ErrorKind> {
        if self.states.len() >= self.max_size {
            return Err(too_large());
        }
        let id = self.states.len() as StateId;
        self.states.push(t);
        Ok(id)
    }

    /// Appends `to` to the priority list of an ε-state.
    fn link(&mut self, from: StateId, to: StateId) {
        match &mut self.states[from as usize] {
            Transition::Eps(list) => list.push(to),
            _ => unreachable!("fragment accept is always an eps state"),
        }
    }

    /// A non-greedy self-loop over the whole alphabet in front of `next`.
    fn wrap_any_loop(&mut self, next: StateId) -> Result<StateId, ErrorKind> {
        let choice = self.alloc(Transition::Eps(smallvec![next]))?;
        let consume = self.alloc(Transition::Consume(self.refinement.all(), choice))?;
        self.link(choice, consume);
        Ok(choice)
    }

    fn compile(&mut self, node: &Node) -> Result<(StateId, StateId), ErrorKind> {
        self.timeout.check("compiler.compile")?;
        match node {
            Node::Sequence(children) => self.compile_sequence(children),
            Node::Disjunction(children) => {
                let mut inits = smallvec![];
                let mut accepts = Vec::with_capacity(children.len());
                for child in children {
                    let (i, a) = self.compile(child)?;
                    inits.push(i);
                    accepts.push(a);
                }
                let init = self.alloc(Transition::Eps(inits))?;
                let accept = self.alloc(Transition::Eps(smallvec![]))?;
                for a in accepts {
                    self.link(a, accept);
                }
                Ok((init, accept))
            }
            Node::Capture(_, child) | Node::NamedCapture(_, _, child) | Node::Group(child) => {
                self.compile(child)
            }
            Node::Star(non_greedy, child) => self.compile_star(*non_greedy, child),
            Node::Plus(non_greedy, child) => {
                let (i0, a0) = self.compile(child)?;
                let accept = self.alloc(Transition::Eps(smallvec![]))?;
                let repeat = self.choice(*non_greedy, i0, accept)?;
                self.link(a0, repeat);
                Ok((i0, accept))
            }
            Node::Question(non_greedy, child) => {
                let (i0, a0) = self.compile(child)?;
                let accept = self.alloc(Transition::Eps(smallvec![]))?;
                let init = self.choice(*non_greedy, i0, accept)?;
                self.link(a0, accept);
                Ok((init, accept))
            }
            Node::Repeat(non_greedy, min, max, child) => {
                self.compile_repeat(*non_greedy, *min, *max, child)
            }
            Node::WordBoundary(invert) => {
                let kind = if *invert {
                    AssertKind::NotWordBoundary
                } else {
                    AssertKind::WordBoundary
                };
                self.compile_assert(kind)
            }
            Node::LineBegin => self.compile_assert(AssertKind::LineBegin),
            Node::LineEnd => self.compile_assert(AssertKind::LineEnd),
            Node::LookAhead(..) => Err(ErrorKind::Unsupported(
                "look-ahead assertion".to_string(),
            )),
            Node::LookBehind(..) => Err(ErrorKind::Unsupported(
                "look-behind assertion".to_string(),
            )),
            Node::BackReference(_) | Node::NamedBackReference(_) => {
                Err(ErrorKind::Unsupported("back-reference".to_string()))
            }
            atom => self.compile_atom(atom),
        }
    }

    fn compile_sequence(&mut self, children: &[Node]) -> Result<(StateId, StateId), ErrorKind> {
        let mut fragment: Option<(StateId, StateId)> = None;
        for child in children {
            let (i, a) = self.compile(child)?;
            fragment = Some(match fragment {
                None => (i, a),
                Some((init, prev_accept)) => {
                    self.link(prev_accept, i);
                    (init, a)
                }
            });
        }
        match fragment {
            Some(f) => Ok(f),
            None => {
                let s = self.alloc(Transition::Eps(smallvec![]))?;
                Ok((s, s))
            }
        }
    }

    /// A two-way ε-choice honoring greediness: greedy tries `body` first.
    fn choice(
        &mut self,
        non_greedy: bool,
        body: StateId,
        exit: StateId,
    ) -> Result<StateId, ErrorKind> {
        let list = if non_greedy {
            smallvec![exit, body]
        } else {
            smallvec![body, exit]
        };
        self.alloc(Transition::Eps(list))
    }

    fn compile_star(
        &mut self,
        non_greedy: bool,
        child: &Node,
    ) -> Result<(StateId, StateId), ErrorKind> {
        let (i0, a0) = self.compile(child)?;
        let accept = self.alloc(Transition::Eps(smallvec![]))?;
        let init = self.choice(non_greedy, i0, accept)?;
        let repeat = self.choice(non_greedy, i0, accept)?;
        self.link(a0, repeat);
        Ok((init, accept))
    }

    fn compile_repeat(
        &mut self,
        non_greedy: bool,
        min: usize,
        max: Option<Option<usize>>,
        child: &Node,
    ) -> Result<(StateId, StateId), ErrorKind> {
        let tail: Option<(StateId, StateId)> = match max {
            None => None,
            Some(None) => Some(self.compile_star(non_greedy, child)?),
            Some(Some(k)) => {
                if k < min {
                    return Err(ErrorKind::InvalidRegExp(
                        "out of order repetition quantifier".to_string(),
                    ));
                }
                if k == min {
                    None
                } else {
                    // Right-folded optional chain of length k - min:
                    // (x (x (x)?)?)? with the repeat's greediness.
                    let mut chain: Option<(StateId, StateId)> = None;
                    for _ in 0..(k - min) {
                        let (bi, ba) = self.compile(child)?;
                        let (ci, ca) = match chain {
                            None => (bi, ba),
                            Some((pi, pa)) => {
                                self.link(ba, pi);
                                (bi, pa)
                            }
                        };
                        let accept = self.alloc(Transition::Eps(smallvec![]))?;
                        let init = self.choice(non_greedy, ci, accept)?;
                        self.link(ca, accept);
                        chain = Some((init, accept));
                    }
                    chain
                }
            }
        };

        let mut fragment: Option<(StateId, StateId)> = None;
        for _ in 0..min {
            let (i, a) = self.compile(child)?;
            fragment = Some(match fragment {
                None => (i, a),
                Some((init, prev_accept)) => {
                    self.link(prev_accept, i);
                    (init, a)
                }
            });
        }
        let combined = match (fragment, tail) {
            (Some((fi, fa)), Some((ti, ta))) => {
                self.link(fa, ti);
                Some((fi, ta))
            }
            (Some(f), None) => Some(f),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        };
        match combined {
            Some(f) => Ok(f),
            None => {
                let s = self.alloc(Transition::Eps(smallvec![]))?;
                Ok((s, s))
            }
        }
    }

    fn compile_assert(&mut self, kind: AssertKind) -> Result<(StateId, StateId), ErrorKind> {
        let accept = self.alloc(Transition::Eps(smallvec![]))?;
        let init = self.alloc(Transition::Assert(kind, accept))?;
        Ok((init, accept))
    }

    fn compile_atom(&mut self, node: &Node) -> Result<(StateId, StateId), ErrorKind> {
        let class = match atom_class(node, &self.flags) {
            Some(c) => c,
            None => {
                return Err(ErrorKind::Unsupported(format!(
                    "unexpected pattern node {:?}",
                    node
                )))
            }
        };
        let base = canon_set(&class.set, &self.flags).intersect(self.domain);
        let refined = self.refinement.refine(&base);
        let atoms = if class.invert {
            let inside: std::collections::BTreeSet<usize> = refined.into_iter().collect();
            (0..self.refinement.len())
                .filter(|i| !inside.contains(i))
                .collect()
        } else {
            refined
        };
        let accept = self.alloc(Transition::Eps(smallvec![]))?;
        let init = self.alloc(Transition::Consume(atoms, accept))?;
        Ok((init, accept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regexp::parse_pattern;

    fn compile(source: &str) -> Result<EpsNfa, ErrorKind> {
        let p = parse_pattern(source, FlagSet::default()).unwrap();
        compile_eps_nfa(&p, 10_000, &Timeout::NoTimeout)
    }

    #[test]
    fn test_simple_pattern_compiles() {
        let nfa = compile("^abc$").unwrap();
        let consumes = nfa
            .states
            .iter()
            .filter(|t| matches!(t, Transition::Consume(..)))
            .count();
        assert_eq!(consumes, 3);
    }

    #[test]
    fn test_unanchored_gets_wrapped() {
        let anchored = compile("^a$").unwrap();
        let unanchored = compile("a").unwrap();
        // The wrapping adds an any-loop on each missing side.
        assert!(unanchored.state_count() > anchored.state_count());
    }

    #[test]
    fn test_lookaround_unsupported() {
        assert_eq!(
            compile("(?=x)a").unwrap_err(),
            ErrorKind::Unsupported("look-ahead assertion".to_string())
        );
        assert_eq!(
            compile("(?<=x)a").unwrap_err(),
            ErrorKind::Unsupported("look-behind assertion".to_string())
        );
    }

    #[test]
    fn test_backreference_unsupported() {
        assert_eq!(
            compile(r"(a)\1").unwrap_err(),
            ErrorKind::Unsupported("back-reference".to_string())
        );
    }

    #[test]
    fn test_out_of_order_bounds_rejected() {
        assert_eq!(
            compile("a{5,2}").unwrap_err(),
            ErrorKind::InvalidRegExp("out of order repetition quantifier".to_string())
        );
    }

    #[test]
    fn test_size_cap() {
        let p = parse_pattern("^a{40}$", FlagSet::default()).unwrap();
        let err = compile_eps_nfa(&p, 20, &Timeout::NoTimeout).unwrap_err();
        assert_eq!(err, too_large());
    }

    #[test]
    fn test_ignore_case_canonicalizes_atoms() {
        let p = parse_pattern("^a$", crate::regexp::parse_flags("i").unwrap()).unwrap();
        let nfa = compile_eps_nfa(&p, 10_000, &Timeout::NoTimeout).unwrap();
        let atom_sets: Vec<_> = nfa
            .states
            .iter()
            .filter_map(|t| match t {
                Transition::Consume(atoms, _) => Some(atoms),
                _ => None,
            })
            .collect();
        assert_eq!(atom_sets.len(), 1);
        let atoms = atom_sets[0];
        assert_eq!(atoms.len(), 1);
        assert!(nfa.alphabet[atoms[0]].set.contains('A'));
        assert!(!nfa.alphabet[atoms[0]].set.contains('a'));
    }

    #[test]
    fn test_referenced_chars() {
        let p = parse_pattern("^(a|a)*$", FlagSet::default()).unwrap();
        let refs = referenced_chars(&p);
        assert!(refs.contains('a'));
        assert!(!refs.contains('b'));
    }
}
