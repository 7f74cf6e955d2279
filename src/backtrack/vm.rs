//! The backtracking VM and its tracers.
//!
//! The VM is an explicit-stack depth-first search over the IR. Step-budget
//! exhaustion is a result variant, not a panic: a tracer returns
//! [`VmError::Limit`] and the run unwinds normally.

use rustc_hash::FxHashSet;
use std::hash::{Hash, Hasher};

use crate::backtrack::{Inst, Label, Program, ReadKind, Term};
use crate::chars::CharSet;
use crate::nfa::AssertKind;
use crate::unicode;

/// The only VM-level failure: a tracer's step budget ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmError {
    Limit,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step limit exceeded")
    }
}

impl std::error::Error for VmError {}

/// Observes every instruction dispatch.
pub trait Tracer {
    fn trace(
        &mut self,
        block: Label,
        inst: usize,
        pos: usize,
        counters: &[usize],
        backtracked: bool,
    ) -> Result<(), VmError>;
}

/// Counts steps and stops at a budget. Used for attack validation.
#[derive(Clone, Debug)]
pub struct LimitTracer {
    limit: usize,
    steps: usize,
}

impl LimitTracer {
    pub fn new(limit: usize) -> Self {
        Self { limit, steps: 0 }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Tracer for LimitTracer {
    fn trace(
        &mut self,
        _block: Label,
        _inst: usize,
        _pos: usize,
        _counters: &[usize],
        _backtracked: bool,
    ) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.limit {
            Err(VmError::Limit)
        } else {
            Ok(())
        }
    }
}

/// One coverage item: program point, loop-counter digest, and whether the
/// VM arrived there while backtracking.
pub type CoverageItem = (Label, usize, u64, bool);

/// Counts steps, records coverage, and yields the steps-per-character rate
/// used as the fuzzer's fitness signal.
#[derive(Clone, Debug)]
pub struct FuzzTracer {
    limit: usize,
    steps: usize,
    coverage: FxHashSet<CoverageItem>,
}

impl FuzzTracer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            steps: 0,
            coverage: FxHashSet::default(),
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn into_coverage(self) -> FxHashSet<CoverageItem> {
        self.coverage
    }

    /// Steps per input character, clamped so empty inputs stay finite.
    pub fn rate(&self, input_len: usize) -> f64 {
        self.steps as f64 / input_len.max(1) as f64
    }
}

impl Tracer for FuzzTracer {
    fn trace(
        &mut self,
        block: Label,
        inst: usize,
        _pos: usize,
        counters: &[usize],
        backtracked: bool,
    ) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(VmError::Limit);
        }
        let mut hasher = rustc_hash::FxHasher::default();
        counters.hash(&mut hasher);
        self.coverage.insert((block, inst, hasher.finish(), backtracked));
        Ok(())
    }
}

#[derive(Clone)]
struct SavedState {
    pos: usize,
    counters: Vec<usize>,
    caps: Vec<Option<usize>>,
    canaries: Vec<usize>,
}

enum Frame {
    Alt {
        target: Label,
        state: SavedState,
    },
    Tx {
        rollback: Option<Label>,
        fallback: Option<Label>,
        state: SavedState,
    },
}

struct Vm<'a> {
    prog: &'a Program,
    input: &'a [char],
    line_terms: CharSet,
    words: CharSet,
    pos: usize,
    counters: Vec<usize>,
    caps: Vec<Option<usize>>,
    canaries: Vec<usize>,
    stack: Vec<Frame>,
    backtracked: bool,
}

impl<'a> Vm<'a> {
    fn new(prog: &'a Program, input: &'a [char], start: usize) -> Self {
        Self {
            prog,
            input,
            line_terms: unicode::line_terminators(),
            words: unicode::word_chars(),
            pos: start,
            counters: vec![0; prog.counters],
            caps: vec![None; prog.captures * 2],
            canaries: Vec::new(),
            stack: Vec::new(),
            backtracked: false,
        }
    }

    fn save(&self) -> SavedState {
        SavedState {
            pos: self.pos,
            counters: self.counters.clone(),
            caps: self.caps.clone(),
            canaries: self.canaries.clone(),
        }
    }

    fn restore(&mut self, state: SavedState) {
        self.pos = state.pos;
        self.counters = state.counters;
        self.caps = state.caps;
        self.canaries = state.canaries;
    }

    fn canon(&self, c: char) -> char {
        if self.prog.flags.ignore_case {
            unicode::canonicalize_char(c, self.prog.flags.unicode)
        } else {
            c
        }
    }

    fn is_word_at(&self, index: Option<usize>) -> bool {
        match index {
            Some(i) if i < self.input.len() => self.words.contains(self.input[i]),
            _ => false,
        }
    }

    fn assert_holds(&self, kind: AssertKind) -> bool {
        let multiline = self.prog.flags.multiline;
        match kind {
            AssertKind::LineBegin => {
                self.pos == 0
                    || (multiline && self.line_terms.contains(self.input[self.pos - 1]))
            }
            AssertKind::LineEnd => {
                self.pos == self.input.len()
                    || (multiline && self.line_terms.contains(self.input[self.pos]))
            }
            AssertKind::WordBoundary => {
                let before = self.pos > 0 && self.is_word_at(Some(self.pos - 1));
                let after = self.is_word_at(Some(self.pos));
                before != after
            }
            AssertKind::NotWordBoundary => {
                let before = self.pos > 0 && self.is_word_at(Some(self.pos - 1));
                let after = self.is_word_at(Some(self.pos));
                before == after
            }
        }
    }

    fn class_matches(&self, set: &CharSet, invert: bool, c: char) -> bool {
        set.contains(self.canon(c)) != invert
    }

    /// The captured text of group `i`, normalized so lookbehind captures
    /// (recorded right to left) read forward.
    fn captured(&self, i: usize) -> Option<(usize, usize)> {
        let begin = self.caps.get(2 * (i - 1)).copied().flatten()?;
        let end = self.caps.get(2 * (i - 1) + 1).copied().flatten()?;
        Some((begin.min(end), begin.max(end)))
    }

    fn read(&mut self, kind: &ReadKind) -> bool {
        match kind {
            ReadKind::Char(c) => {
                if self.pos < self.input.len() && self.canon(self.input[self.pos]) == *c {
                    self.pos += 1;
                    true
                } else {
                    false
                }
            }
            ReadKind::Class { set, invert } => {
                if self.pos < self.input.len()
                    && self.class_matches(set, *invert, self.input[self.pos])
                {
                    self.pos += 1;
                    true
                } else {
                    false
                }
            }
            ReadKind::Ref(i) => {
                let (begin, end) = match self.captured(*i) {
                    Some(span) => span,
                    // An unset group matches the empty string.
                    None => return true,
                };
                let len = end - begin;
                if self.pos + len > self.input.len() {
                    return false;
                }
                for k in 0..len {
                    if self.canon(self.input[self.pos + k]) != self.canon(self.input[begin + k])
                    {
                        return false;
                    }
                }
                self.pos += len;
                true
            }
        }
    }

    fn read_back(&mut self, kind: &ReadKind) -> bool {
        match kind {
            ReadKind::Char(c) => {
                if self.pos > 0 && self.canon(self.input[self.pos - 1]) == *c {
                    self.pos -= 1;
                    true
                } else {
                    false
                }
            }
            ReadKind::Class { set, invert } => {
                if self.pos > 0 && self.class_matches(set, *invert, self.input[self.pos - 1]) {
                    self.pos -= 1;
                    true
                } else {
                    false
                }
            }
            ReadKind::Ref(i) => {
                let (begin, end) = match self.captured(*i) {
                    Some(span) => span,
                    None => return true,
                };
                let len = end - begin;
                if self.pos < len {
                    return false;
                }
                for k in 0..len {
                    if self.canon(self.input[self.pos - len + k])
                        != self.canon(self.input[begin + k])
                    {
                        return false;
                    }
                }
                self.pos -= len;
                true
            }
        }
    }

    fn apply(&mut self, inst: &Inst) -> bool {
        match inst {
            Inst::PushCanary => {
                self.canaries.push(self.pos);
                true
            }
            Inst::CheckCanary => match self.canaries.pop() {
                Some(p) => p != self.pos,
                None => true,
            },
            Inst::Reset(r) => {
                self.counters[*r] = 0;
                true
            }
            Inst::Inc(r) => {
                self.counters[*r] += 1;
                true
            }
            Inst::Assert(kind) => self.assert_holds(*kind),
            Inst::Read(kind) => {
                let ok = self.read(kind);
                if ok {
                    self.backtracked = false;
                }
                ok
            }
            Inst::ReadBack(kind) => {
                let ok = self.read_back(kind);
                if ok {
                    self.backtracked = false;
                }
                ok
            }
            Inst::CapBegin(i) => {
                self.caps[2 * (i - 1)] = Some(self.pos);
                true
            }
            Inst::CapEnd(i) => {
                self.caps[2 * (i - 1) + 1] = Some(self.pos);
                true
            }
            Inst::CapReset(from, to) => {
                for g in *from..=*to {
                    self.caps[2 * (g - 1)] = None;
                    self.caps[2 * (g - 1) + 1] = None;
                }
                true
            }
        }
    }

    /// Pops the stack after a failure. Returns the next block, or `None`
    /// when the match attempt is exhausted.
    fn backtrack(&mut self) -> Option<Label> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Alt { target, state } => {
                    self.restore(state);
                    self.backtracked = true;
                    return Some(target);
                }
                Frame::Tx {
                    fallback, state, ..
                } => {
                    // The transaction body is exhausted: a negative
                    // lookaround succeeds, a positive one keeps failing.
                    self.restore(state);
                    if let Some(l) = fallback {
                        self.backtracked = true;
                        return Some(l);
                    }
                }
            }
        }
        None
    }

    /// Commits the innermost transaction.
    fn rollback(&mut self) -> Result<Option<Label>, ()> {
        while let Some(frame) = self.stack.pop() {
            if let Frame::Tx {
                rollback, state, ..
            } = frame
            {
                self.restore(state);
                return match rollback {
                    Some(l) => Ok(Some(l)),
                    None => Err(()),
                };
            }
        }
        Ok(None)
    }
}

/// Runs the pattern at a fixed start position.
pub fn execute<T: Tracer>(
    prog: &Program,
    input: &[char],
    start: usize,
    tracer: &mut T,
) -> Result<bool, VmError> {
    let mut vm = Vm::new(prog, input, start);
    let mut block = prog.entry;
    'dispatch: loop {
        let b = &prog.blocks[block];
        for (i, inst) in b.insts.iter().enumerate() {
            tracer.trace(block, i, vm.pos, &vm.counters, vm.backtracked)?;
            if !vm.apply(inst) {
                match vm.backtrack() {
                    Some(next) => {
                        block = next;
                        continue 'dispatch;
                    }
                    None => return Ok(false),
                }
            }
        }
        tracer.trace(block, b.insts.len(), vm.pos, &vm.counters, vm.backtracked)?;
        match &b.term {
            Term::Ok => return Ok(true),
            Term::Jmp(l) => block = *l,
            Term::Try(first, second) => {
                let state = vm.save();
                vm.stack.push(Frame::Alt {
                    target: *second,
                    state,
                });
                block = *first;
            }
            Term::Cmp { reg, value, lt, ge } => {
                block = if vm.counters[*reg] < *value { *lt } else { *ge };
            }
            Term::Rollback => match vm.rollback() {
                Ok(Some(l)) => block = l,
                Ok(None) | Err(()) => match vm.backtrack() {
                    Some(next) => block = next,
                    None => return Ok(false),
                },
            },
            Term::Tx {
                next,
                rollback,
                fallback,
            } => {
                let state = vm.save();
                vm.stack.push(Frame::Tx {
                    rollback: *rollback,
                    fallback: *fallback,
                    state,
                });
                block = *next;
            }
        }
    }
}

/// Runs the pattern the way an engine's `exec` does: retrying at each
/// successive start position until a match or the end of input. A sticky
/// pattern only runs at the first position.
pub fn run<T: Tracer>(prog: &Program, input: &[char], tracer: &mut T) -> Result<bool, VmError> {
    if prog.flags.sticky {
        return execute(prog, input, 0, tracer);
    }
    for start in 0..=input.len() {
        if execute(prog, input, start, tracer)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrack::compile_ir;
    use crate::regexp::{parse_flags, parse_pattern};

    fn program(source: &str, flags: &str) -> Program {
        let flags = parse_flags(flags).unwrap();
        let p = parse_pattern(source, flags).unwrap();
        compile_ir(&p).unwrap()
    }

    fn matches(source: &str, flags: &str, input: &str) -> bool {
        let prog = program(source, flags);
        let chars: Vec<char> = input.chars().collect();
        let mut tracer = LimitTracer::new(1_000_000);
        run(&prog, &chars, &mut tracer).unwrap()
    }

    #[test]
    fn test_literal_match() {
        assert!(matches("^abc$", "", "abc"));
        assert!(!matches("^abc$", "", "abd"));
        assert!(matches("abc", "", "xxabcxx"));
    }

    #[test]
    fn test_quantifiers() {
        assert!(matches("^a*$", "", ""));
        assert!(matches("^a*$", "", "aaa"));
        assert!(matches("^a+$", "", "a"));
        assert!(!matches("^a+$", "", ""));
        assert!(matches("^a?b$", "", "b"));
        assert!(matches("^a?b$", "", "ab"));
        assert!(!matches("^a?b$", "", "aab"));
    }

    #[test]
    fn test_bounded_repeats() {
        assert!(!matches("^a{2,4}$", "", "a"));
        assert!(matches("^a{2,4}$", "", "aa"));
        assert!(matches("^a{2,4}$", "", "aaaa"));
        assert!(!matches("^a{2,4}$", "", "aaaaa"));
        assert!(matches("^a{3}$", "", "aaa"));
        assert!(!matches("^a{3}$", "", "aaaa"));
        assert!(matches("^a{2,}$", "", "aaaaaa"));
    }

    #[test]
    fn test_alternation_prefers_left() {
        assert!(matches("^(ab|a)b$", "", "ab"));
        assert!(matches("^(ab|a)b$", "", "abb"));
    }

    #[test]
    fn test_classes_and_dot() {
        assert!(matches("^[a-c]+$", "", "abc"));
        assert!(!matches("^[a-c]+$", "", "abd"));
        assert!(matches("^[^a]$", "", "b"));
        assert!(!matches("^.$", "", "\n"));
        assert!(matches("^.$", "s", "\n"));
    }

    #[test]
    fn test_ignore_case() {
        assert!(matches("^abc$", "i", "AbC"));
        assert!(matches("^[a-z]+$", "i", "XYZ"));
    }

    #[test]
    fn test_assertions() {
        assert!(matches(r"^a\b !$", "", "a !"));
        assert!(!matches(r"^a\bb$", "", "ab"));
        assert!(matches(r"^a\Bb$", "", "ab"));
        assert!(matches("^ab$", "m", "x\nab"));
    }

    #[test]
    fn test_lookahead() {
        assert!(matches("^a(?=b)b$", "", "ab"));
        assert!(!matches("^a(?=c)b$", "", "ab"));
        assert!(matches("^a(?!c)b$", "", "ab"));
        assert!(!matches("^a(?!b)b$", "", "ab"));
    }

    #[test]
    fn test_lookbehind() {
        assert!(matches("a(?<=a)b", "", "ab"));
        assert!(matches("(?<=ab)c", "", "abc"));
        assert!(!matches("(?<=ax)c", "", "abc"));
        assert!(matches("(?<!x)c", "", "abc"));
        assert!(!matches("(?<!b)c", "", "abc"));
    }

    #[test]
    fn test_backreference() {
        assert!(matches(r"^(ab)\1$", "", "abab"));
        assert!(!matches(r"^(ab)\1$", "", "abxy"));
        assert!(matches(r"^(?<x>a+)-\k<x>$", "", "aa-aa"));
        assert!(!matches(r"^(?<x>a+)-\k<x>$", "", "aa-a"));
    }

    #[test]
    fn test_empty_loop_terminates() {
        // A body that can match empty must not spin forever.
        assert!(matches("^(?:a?)*b$", "", "b"));
        assert!(matches("^(a*)*$", "", "aaa"));
    }

    #[test]
    fn test_limit_tracer_fires_on_blowup() {
        let prog = program("^(a+)+$", "");
        let mut input: Vec<char> = vec!['a'; 40];
        input.push('!');
        let mut tracer = LimitTracer::new(1_000_000);
        let result = run(&prog, &input, &mut tracer);
        assert_eq!(result, Err(VmError::Limit));
    }

    #[test]
    fn test_linear_pattern_stays_under_limit() {
        let prog = program("^a*b$", "");
        let mut input: Vec<char> = vec!['a'; 1000];
        input.push('!');
        let mut tracer = LimitTracer::new(1_000_000);
        let result = run(&prog, &input, &mut tracer);
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn test_fuzz_tracer_coverage_and_rate() {
        let prog = program("^a*b$", "");
        let chars: Vec<char> = "aaab".chars().collect();
        let mut tracer = FuzzTracer::new(100_000);
        let matched = run(&prog, &chars, &mut tracer).unwrap();
        assert!(matched);
        assert!(tracer.steps() > 0);
        assert!(tracer.rate(chars.len()) > 0.0);
        assert!(!tracer.clone().into_coverage().is_empty());
    }

    #[test]
    fn test_capture_reset_between_iterations() {
        // The optional group resets each iteration, so \1 sees the empty
        // string once the group stops participating.
        assert!(matches(r"^(?:(a)|b)*\1$", "", "ab"));
    }
}
