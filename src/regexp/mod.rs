//! Pattern AST for ECMA-262 regular expressions.
//!
//! The parser produces a [`Pattern`]: a [`Node`] tree plus the pattern's
//! [`FlagSet`]. The tree is immutable after parsing and shared read-only by
//! the automaton and fuzz paths.

mod classes;
mod parser;

pub use classes::{atom_class, escape_class_set, AtomClass};
pub use parser::{parse_flags, parse_pattern, SyntaxError};

use rustc_hash::FxHashMap;

/// The `g i m s u y` flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub sticky: bool,
}

/// The class escapes `\d`, `\w`, `\s` (and their negations).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeClassKind {
    Digit,
    Word,
    Space,
}

/// One item of a bracketed character class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassItem {
    Char(char),
    Range(char, char),
    /// `\d`-style escape; `invert` for the upper-case form.
    Escape(bool, EscapeClassKind),
    /// `\p{..}` by property name or general category.
    Property(bool, String),
    /// `\p{Key=Value}`.
    PropertyValue(bool, String, String),
}

/// A pattern node. Repetition nodes carry a `non_greedy` flag; assertion and
/// class nodes carry an `invert` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Disjunction(Vec<Node>),
    Sequence(Vec<Node>),
    /// Numbered capture group; the index is the ECMA-262 group number.
    Capture(usize, Box<Node>),
    NamedCapture(usize, String, Box<Node>),
    /// Non-capturing `(?:..)` group.
    Group(Box<Node>),
    Star(bool, Box<Node>),
    Plus(bool, Box<Node>),
    Question(bool, Box<Node>),
    /// `{min}`, `{min,}` or `{min,max}`: `max` is `None` for an exact
    /// count, `Some(None)` for an unbounded upper end, `Some(Some(k))`
    /// for a bounded one.
    Repeat(bool, usize, Option<Option<usize>>, Box<Node>),
    WordBoundary(bool),
    LineBegin,
    LineEnd,
    LookAhead(bool, Box<Node>),
    LookBehind(bool, Box<Node>),
    Character(char),
    CharacterClass(bool, Vec<ClassItem>),
    SimpleEscapeClass(bool, EscapeClassKind),
    UnicodeProperty(bool, String),
    UnicodePropertyValue(bool, String, String),
    Dot,
    BackReference(usize),
    NamedBackReference(String),
}

/// A parsed pattern with its flags and capture-group table.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub node: Node,
    pub flags: FlagSet,
    /// Number of capture groups (named and numbered).
    pub capture_count: usize,
    /// Group name to group number.
    pub names: FxHashMap<String, usize>,
}

impl Node {
    /// Number of nodes in the tree, with bounded repetitions weighted by
    /// their expansion count. Used by the hybrid size guard.
    pub fn size(&self) -> usize {
        match self {
            Node::Disjunction(children) | Node::Sequence(children) => {
                1 + children.iter().map(Node::size).sum::<usize>()
            }
            Node::Capture(_, child)
            | Node::NamedCapture(_, _, child)
            | Node::Group(child)
            | Node::Star(_, child)
            | Node::Plus(_, child)
            | Node::Question(_, child)
            | Node::LookAhead(_, child)
            | Node::LookBehind(_, child) => 1 + child.size(),
            Node::Repeat(_, min, max, child) => {
                let copies = match max {
                    None => *min,
                    Some(None) => min + 1,
                    Some(Some(k)) => *min.max(k),
                };
                1 + child.size() * copies.max(1)
            }
            _ => 1,
        }
    }

    /// True when matching never involves a variable amount of repetition:
    /// no unbounded quantifier and no variable-width bounded one.
    pub fn is_constant(&self) -> bool {
        match self {
            Node::Disjunction(children) | Node::Sequence(children) => {
                children.iter().all(Node::is_constant)
            }
            Node::Capture(_, child)
            | Node::NamedCapture(_, _, child)
            | Node::Group(child)
            | Node::LookAhead(_, child)
            | Node::LookBehind(_, child) => child.is_constant(),
            Node::Star(..) | Node::Plus(..) | Node::Question(..) => false,
            Node::Repeat(_, min, max, child) => match max {
                None => child.is_constant(),
                Some(None) => false,
                Some(Some(k)) => k == min && child.is_constant(),
            },
            _ => true,
        }
    }

    /// Sum of bounded-repetition counts; the hybrid guard skips the
    /// automaton when this grows large, because bounded repeats expand into
    /// that many NFA fragments.
    pub fn repeat_count(&self) -> usize {
        match self {
            Node::Disjunction(children) | Node::Sequence(children) => {
                children.iter().map(Node::repeat_count).sum()
            }
            Node::Capture(_, child)
            | Node::NamedCapture(_, _, child)
            | Node::Group(child)
            | Node::Star(_, child)
            | Node::Plus(_, child)
            | Node::Question(_, child)
            | Node::LookAhead(_, child)
            | Node::LookBehind(_, child) => child.repeat_count(),
            Node::Repeat(_, min, max, child) => {
                let own = match max {
                    None => *min,
                    Some(None) => *min,
                    Some(Some(k)) => *min.max(k),
                };
                own + child.repeat_count()
            }
            _ => 0,
        }
    }

    /// True when the node begins with `^` on every alternative.
    pub fn has_line_begin_at_begin(&self) -> bool {
        match self {
            Node::Disjunction(children) => {
                !children.is_empty() && children.iter().all(Node::has_line_begin_at_begin)
            }
            Node::Sequence(children) => {
                children.first().is_some_and(Node::has_line_begin_at_begin)
            }
            Node::Capture(_, child) | Node::NamedCapture(_, _, child) | Node::Group(child) => {
                child.has_line_begin_at_begin()
            }
            Node::LineBegin => true,
            _ => false,
        }
    }

    /// True when the node ends with `$` on every alternative.
    pub fn has_line_end_at_end(&self) -> bool {
        match self {
            Node::Disjunction(children) => {
                !children.is_empty() && children.iter().all(Node::has_line_end_at_end)
            }
            Node::Sequence(children) => {
                children.last().is_some_and(Node::has_line_end_at_end)
            }
            Node::Capture(_, child) | Node::NamedCapture(_, _, child) | Node::Group(child) => {
                child.has_line_end_at_end()
            }
            Node::LineEnd => true,
            _ => false,
        }
    }
}

impl Pattern {
    pub fn size(&self) -> usize {
        self.node.size()
    }

    pub fn is_constant(&self) -> bool {
        self.node.is_constant()
    }

    pub fn repeat_count(&self) -> usize {
        self.node.repeat_count()
    }

    pub fn has_line_begin_at_begin(&self) -> bool {
        self.node.has_line_begin_at_begin()
    }

    pub fn has_line_end_at_end(&self) -> bool {
        self.node.has_line_end_at_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Pattern {
        parse_pattern(source, FlagSet::default()).unwrap()
    }

    #[test]
    fn test_is_constant() {
        assert!(parse("abc").is_constant());
        assert!(parse("a{3}b").is_constant());
        assert!(!parse("a*b").is_constant());
        assert!(!parse("a+").is_constant());
        assert!(!parse("a?").is_constant());
        assert!(!parse("a{3,5}").is_constant());
        assert!(!parse("a{3,}").is_constant());
        assert!(parse("a{3,3}").is_constant());
    }

    #[test]
    fn test_anchor_facts() {
        assert!(parse("^abc$").has_line_begin_at_begin());
        assert!(parse("^abc$").has_line_end_at_end());
        assert!(!parse("abc$").has_line_begin_at_begin());
        assert!(!parse("^abc").has_line_end_at_end());
        assert!(parse("^a|^b").has_line_begin_at_begin());
        assert!(!parse("^a|b").has_line_begin_at_begin());
        assert!(parse("(^a)").has_line_begin_at_begin());
    }

    #[test]
    fn test_repeat_count() {
        assert_eq!(parse("a*").repeat_count(), 0);
        assert_eq!(parse("a{3,5}").repeat_count(), 5);
        assert_eq!(parse("a{4}b{6}").repeat_count(), 10);
        assert_eq!(parse("(a{7}){2}").repeat_count(), 9);
    }

    #[test]
    fn test_size_weights_repeats() {
        assert!(parse("a{100}").size() > 100);
        assert!(parse("ab").size() < 10);
    }
}
