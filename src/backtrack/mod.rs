//! Block-structured IR for canonical ECMA-262 backtracking.
//!
//! The IR covers the whole AST, including the constructs the automaton path
//! refuses: lookaround compiles to transactions (`tx`/`rollback`) and
//! back-references to a `read` kind. The fuzz checker drives the VM over
//! this IR as its fitness oracle.

mod vm;

pub use vm::{execute, run, CoverageItem, FuzzTracer, LimitTracer, Tracer, VmError};

use crate::chars::CharSet;
use crate::diagnostics::ErrorKind;
use crate::nfa::AssertKind;
use crate::regexp::{atom_class, FlagSet, Node, Pattern};
use crate::unicode;

pub type Label = usize;

/// What a `read`/`read_back` consumes.
#[derive(Clone, Debug)]
pub enum ReadKind {
    Char(char),
    Class { set: CharSet, invert: bool },
    /// Back-reference to a capture group (1-based).
    Ref(usize),
}

/// Non-terminator instructions.
#[derive(Clone, Debug)]
pub enum Inst {
    /// Remember the position at loop-body entry.
    PushCanary,
    /// Fail the path when the body consumed nothing.
    CheckCanary,
    Reset(usize),
    Inc(usize),
    Assert(AssertKind),
    Read(ReadKind),
    ReadBack(ReadKind),
    CapBegin(usize),
    CapEnd(usize),
    /// Clear capture groups `from..=to`.
    CapReset(usize, usize),
}

/// Block terminators.
#[derive(Clone, Debug)]
pub enum Term {
    Ok,
    Jmp(Label),
    /// Push a backtrack point to the second label, continue at the first.
    Try(Label, Label),
    Cmp {
        reg: usize,
        value: usize,
        lt: Label,
        ge: Label,
    },
    /// Commit a transaction: restore the state saved at `tx` and continue
    /// at its rollback label (fail the path when there is none).
    Rollback,
    /// Open a transaction. Exhausting the sub-match without a rollback
    /// lands on `fallback` (fail the path when there is none).
    Tx {
        next: Label,
        rollback: Option<Label>,
        fallback: Option<Label>,
    },
}

#[derive(Clone, Debug)]
pub struct Block {
    pub insts: Vec<Inst>,
    pub term: Term,
}

/// A compiled pattern.
#[derive(Clone, Debug)]
pub struct Program {
    pub blocks: Vec<Block>,
    pub entry: Label,
    pub counters: usize,
    pub captures: usize,
    pub flags: FlagSet,
}

/// Compiles a pattern to IR. Rejects out-of-order repetition bounds the
/// same way the ε-NFA compiler does.
pub fn compile_ir(pattern: &Pattern) -> Result<Program, ErrorKind> {
    let mut builder = IrBuilder {
        blocks: Vec::new(),
        counters: 0,
        flags: pattern.flags,
        names: &pattern.names,
    };
    let ok = builder.push(Block {
        insts: Vec::new(),
        term: Term::Ok,
    });
    let entry = builder.compile(&pattern.node, ok, false)?;
    tracing::debug!(blocks = builder.blocks.len(), "compiled ir");
    Ok(Program {
        blocks: builder.blocks,
        entry,
        counters: builder.counters,
        captures: pattern.capture_count,
        flags: pattern.flags,
    })
}

/// Smallest and largest capture-group index inside a node, if any.
fn capture_range(node: &Node) -> Option<(usize, usize)> {
    fn merge(a: Option<(usize, usize)>, b: Option<(usize, usize)>) -> Option<(usize, usize)> {
        match (a, b) {
            (Some((alo, ahi)), Some((blo, bhi))) => Some((alo.min(blo), ahi.max(bhi))),
            (x, None) => x,
            (None, y) => y,
        }
    }
    match node {
        Node::Disjunction(children) | Node::Sequence(children) => children
            .iter()
            .fold(None, |acc, c| merge(acc, capture_range(c))),
        Node::Capture(i, child) | Node::NamedCapture(i, _, child) => {
            merge(Some((*i, *i)), capture_range(child))
        }
        Node::Group(child)
        | Node::Star(_, child)
        | Node::Plus(_, child)
        | Node::Question(_, child)
        | Node::Repeat(_, _, _, child)
        | Node::LookAhead(_, child)
        | Node::LookBehind(_, child) => capture_range(child),
        _ => None,
    }
}

struct IrBuilder<'a> {
    blocks: Vec<Block>,
    counters: usize,
    flags: FlagSet,
    names: &'a rustc_hash::FxHashMap<String, usize>,
}

impl IrBuilder<'_> {
    fn push(&mut self, block: Block) -> Label {
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Reserves a label to be filled in later (loop heads).
    fn reserve(&mut self) -> Label {
        self.push(Block {
            insts: Vec::new(),
            term: Term::Ok,
        })
    }

    fn set(&mut self, label: Label, block: Block) {
        self.blocks[label] = block;
    }

    fn alloc_counter(&mut self) -> usize {
        self.counters += 1;
        self.counters - 1
    }

    fn canon(&self, c: char) -> char {
        if self.flags.ignore_case {
            unicode::canonicalize_char(c, self.flags.unicode)
        } else {
            c
        }
    }

    fn canon_set(&self, set: CharSet) -> CharSet {
        if self.flags.ignore_case {
            crate::chars::IChar::new(set)
                .canonicalize(self.flags.unicode)
                .set
        } else {
            set
        }
    }

    fn read_inst(&self, kind: ReadKind, reverse: bool) -> Inst {
        if reverse {
            Inst::ReadBack(kind)
        } else {
            Inst::Read(kind)
        }
    }

    /// Try-terminator with the greedy branch first.
    fn try_term(&self, non_greedy: bool, body: Label, exit: Label) -> Term {
        if non_greedy {
            Term::Try(exit, body)
        } else {
            Term::Try(body, exit)
        }
    }

    /// A `[CapReset]` prologue in front of `entry` when the body captures.
    fn reset_prologue(&mut self, node: &Node, entry: Label) -> Label {
        match capture_range(node) {
            Some((lo, hi)) => self.push(Block {
                insts: vec![Inst::CapReset(lo, hi)],
                term: Term::Jmp(entry),
            }),
            None => entry,
        }
    }

    fn compile(&mut self, node: &Node, cont: Label, reverse: bool) -> Result<Label, ErrorKind> {
        match node {
            Node::Sequence(children) => {
                let mut cont = cont;
                // Backward matching consumes the sequence right to left.
                if reverse {
                    for child in children.iter() {
                        cont = self.compile(child, cont, reverse)?;
                    }
                } else {
                    for child in children.iter().rev() {
                        cont = self.compile(child, cont, reverse)?;
                    }
                }
                Ok(cont)
            }
            Node::Disjunction(children) => {
                let mut chain: Option<Label> = None;
                for child in children.iter().rev() {
                    let entry = self.compile(child, cont, reverse)?;
                    chain = Some(match chain {
                        None => entry,
                        Some(rest) => self.push(Block {
                            insts: Vec::new(),
                            term: Term::Try(entry, rest),
                        }),
                    });
                }
                Ok(chain.unwrap_or(cont))
            }
            Node::Capture(i, child) | Node::NamedCapture(i, _, child) => {
                let (open, close) = if reverse {
                    (Inst::CapEnd(*i), Inst::CapBegin(*i))
                } else {
                    (Inst::CapBegin(*i), Inst::CapEnd(*i))
                };
                let close_blk = self.push(Block {
                    insts: vec![close],
                    term: Term::Jmp(cont),
                });
                let inner = self.compile(child, close_blk, reverse)?;
                Ok(self.push(Block {
                    insts: vec![open],
                    term: Term::Jmp(inner),
                }))
            }
            Node::Group(child) => self.compile(child, cont, reverse),
            Node::Star(non_greedy, child) => self.compile_star(*non_greedy, child, cont, reverse),
            Node::Plus(non_greedy, child) => {
                let star = self.compile_star(*non_greedy, child, cont, reverse)?;
                let first = self.compile(child, star, reverse)?;
                Ok(self.reset_prologue(child, first))
            }
            Node::Question(non_greedy, child) => {
                let body = self.compile(child, cont, reverse)?;
                let body = self.reset_prologue(child, body);
                Ok(self.push(Block {
                    insts: Vec::new(),
                    term: self.try_term(*non_greedy, body, cont),
                }))
            }
            Node::Repeat(non_greedy, min, max, child) => {
                self.compile_repeat(*non_greedy, *min, *max, child, cont, reverse)
            }
            Node::WordBoundary(invert) => {
                let kind = if *invert {
                    AssertKind::NotWordBoundary
                } else {
                    AssertKind::WordBoundary
                };
                Ok(self.push(Block {
                    insts: vec![Inst::Assert(kind)],
                    term: Term::Jmp(cont),
                }))
            }
            Node::LineBegin => Ok(self.push(Block {
                insts: vec![Inst::Assert(AssertKind::LineBegin)],
                term: Term::Jmp(cont),
            })),
            Node::LineEnd => Ok(self.push(Block {
                insts: vec![Inst::Assert(AssertKind::LineEnd)],
                term: Term::Jmp(cont),
            })),
            Node::LookAhead(invert, child) => {
                let rollback_blk = self.push(Block {
                    insts: Vec::new(),
                    term: Term::Rollback,
                });
                let sub = self.compile(child, rollback_blk, false)?;
                let (rollback, fallback) = if *invert {
                    (None, Some(cont))
                } else {
                    (Some(cont), None)
                };
                Ok(self.push(Block {
                    insts: Vec::new(),
                    term: Term::Tx {
                        next: sub,
                        rollback,
                        fallback,
                    },
                }))
            }
            Node::LookBehind(invert, child) => {
                let rollback_blk = self.push(Block {
                    insts: Vec::new(),
                    term: Term::Rollback,
                });
                let sub = self.compile(child, rollback_blk, true)?;
                let (rollback, fallback) = if *invert {
                    (None, Some(cont))
                } else {
                    (Some(cont), None)
                };
                Ok(self.push(Block {
                    insts: Vec::new(),
                    term: Term::Tx {
                        next: sub,
                        rollback,
                        fallback,
                    },
                }))
            }
            Node::BackReference(i) => {
                let inst = self.read_inst(ReadKind::Ref(*i), reverse);
                Ok(self.push(Block {
                    insts: vec![inst],
                    term: Term::Jmp(cont),
                }))
            }
            Node::NamedBackReference(name) => {
                let index = self.names.get(name).copied().ok_or_else(|| {
                    ErrorKind::InvalidRegExp(format!("unresolved group name '{}'", name))
                })?;
                let inst = self.read_inst(ReadKind::Ref(index), reverse);
                Ok(self.push(Block {
                    insts: vec![inst],
                    term: Term::Jmp(cont),
                }))
            }
            atom => {
                let class = match atom_class(atom, &self.flags) {
                    Some(c) => c,
                    None => {
                        return Err(ErrorKind::InvalidRegExp(format!(
                            "unexpected pattern node {:?}",
                            atom
                        )))
                    }
                };
                let kind = match atom {
                    Node::Character(c) => ReadKind::Char(self.canon(*c)),
                    _ => ReadKind::Class {
                        set: self.canon_set(class.set),
                        invert: class.invert,
                    },
                };
                let inst = self.read_inst(kind, reverse);
                Ok(self.push(Block {
                    insts: vec![inst],
                    term: Term::Jmp(cont),
                }))
            }
        }
    }

    /// An unbounded loop with an empty-iteration canary.
    fn compile_star(
        &mut self,
        non_greedy: bool,
        child: &Node,
        cont: Label,
        reverse: bool,
    ) -> Result<Label, ErrorKind> {
        let head = self.reserve();
        let post = self.push(Block {
            insts: vec![Inst::CheckCanary],
            term: Term::Jmp(head),
        });
        let body = self.compile(child, post, reverse)?;
        let mut pre_insts = vec![Inst::PushCanary];
        if let Some((lo, hi)) = capture_range(child) {
            pre_insts.push(Inst::CapReset(lo, hi));
        }
        let pre = self.push(Block {
            insts: pre_insts,
            term: Term::Jmp(body),
        });
        self.set(
            head,
            Block {
                insts: Vec::new(),
                term: self.try_term(non_greedy, pre, cont),
            },
        );
        Ok(head)
    }

    /// A counted loop running the body exactly `count` more times.
    fn compile_exact_loop(
        &mut self,
        count: usize,
        child: &Node,
        cont: Label,
        reverse: bool,
    ) -> Result<Label, ErrorKind> {
        if count == 0 {
            return Ok(cont);
        }
        let reg = self.alloc_counter();
        let head = self.reserve();
        let post = self.push(Block {
            insts: vec![Inst::Inc(reg)],
            term: Term::Jmp(head),
        });
        let body = self.compile(child, post, reverse)?;
        let body = self.reset_prologue(child, body);
        self.set(
            head,
            Block {
                insts: Vec::new(),
                term: Term::Cmp {
                    reg,
                    value: count,
                    lt: body,
                    ge: cont,
                },
            },
        );
        Ok(self.push(Block {
            insts: vec![Inst::Reset(reg)],
            term: Term::Jmp(head),
        }))
    }

    /// Up to `count` optional iterations with both a counter and a canary.
    fn compile_optional_loop(
        &mut self,
        non_greedy: bool,
        count: usize,
        child: &Node,
        cont: Label,
        reverse: bool,
    ) -> Result<Label, ErrorKind> {
        if count == 0 {
            return Ok(cont);
        }
        let reg = self.alloc_counter();
        let head = self.reserve();
        let post = self.push(Block {
            insts: vec![Inst::CheckCanary, Inst::Inc(reg)],
            term: Term::Jmp(head),
        });
        let body = self.compile(child, post, reverse)?;
        let mut pre_insts = vec![Inst::PushCanary];
        if let Some((lo, hi)) = capture_range(child) {
            pre_insts.push(Inst::CapReset(lo, hi));
        }
        let pre = self.push(Block {
            insts: pre_insts,
            term: Term::Jmp(body),
        });
        let try_blk = self.push(Block {
            insts: Vec::new(),
            term: self.try_term(non_greedy, pre, cont),
        });
        self.set(
            head,
            Block {
                insts: Vec::new(),
                term: Term::Cmp {
                    reg,
                    value: count,
                    lt: try_blk,
                    ge: cont,
                },
            },
        );
        Ok(self.push(Block {
            insts: vec![Inst::Reset(reg)],
            term: Term::Jmp(head),
        }))
    }

    fn compile_repeat(
        &mut self,
        non_greedy: bool,
        min: usize,
        max: Option<Option<usize>>,
        child: &Node,
        cont: Label,
        reverse: bool,
    ) -> Result<Label, ErrorKind> {
        match max {
            None => self.compile_exact_loop(min, child, cont, reverse),
            Some(None) => {
                let star = self.compile_star(non_greedy, child, cont, reverse)?;
                self.compile_exact_loop(min, child, star, reverse)
            }
            Some(Some(k)) => {
                if k < min {
                    return Err(ErrorKind::InvalidRegExp(
                        "out of order repetition quantifier".to_string(),
                    ));
                }
                let optional =
                    self.compile_optional_loop(non_greedy, k - min, child, cont, reverse)?;
                self.compile_exact_loop(min, child, optional, reverse)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regexp::{parse_flags, parse_pattern};

    fn compile(source: &str, flags: &str) -> Program {
        let flags = parse_flags(flags).unwrap();
        let p = parse_pattern(source, flags).unwrap();
        compile_ir(&p).unwrap()
    }

    #[test]
    fn test_literal_compiles_to_reads() {
        let prog = compile("abc", "");
        let reads = prog
            .blocks
            .iter()
            .flat_map(|b| &b.insts)
            .filter(|i| matches!(i, Inst::Read(_)))
            .count();
        assert_eq!(reads, 3);
    }

    #[test]
    fn test_repeat_allocates_counter() {
        let prog = compile("a{2,4}", "");
        assert_eq!(prog.counters, 2);
    }

    #[test]
    fn test_capture_range() {
        let p = parse_pattern("((a)(b))(c)", crate::regexp::FlagSet::default()).unwrap();
        assert_eq!(capture_range(&p.node), Some((1, 4)));
    }

    #[test]
    fn test_out_of_order_bounds_rejected() {
        let p = parse_pattern("a{5,2}", crate::regexp::FlagSet::default()).unwrap();
        assert!(matches!(
            compile_ir(&p),
            Err(ErrorKind::InvalidRegExp(_))
        ));
    }

    #[test]
    fn test_ignore_case_canonicalizes_reads() {
        let prog = compile("a", "i");
        let read = prog
            .blocks
            .iter()
            .flat_map(|b| &b.insts)
            .find_map(|i| match i {
                Inst::Read(ReadKind::Char(c)) => Some(*c),
                _ => None,
            });
        assert_eq!(read, Some('A'));
    }

    #[test]
    fn test_lookbehind_reads_backwards() {
        let prog = compile("(?<=ab)c", "");
        let back_reads = prog
            .blocks
            .iter()
            .flat_map(|b| &b.insts)
            .filter(|i| matches!(i, Inst::ReadBack(_)))
            .count();
        assert_eq!(back_reads, 2);
    }
}
