//! Analysis results and the error taxonomy.

use std::fmt;

use crate::automaton::Complexity;

/// Which checker produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checker {
    Automaton,
    Fuzz,
    Hybrid,
}

impl fmt::Display for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checker::Automaton => write!(f, "automaton"),
            Checker::Fuzz => write!(f, "fuzz"),
            Checker::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Expected analysis failures. Anything outside this taxonomy is a bug in
/// the analyzer, not a property of the pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The cooperative deadline was exceeded.
    Timeout,
    /// The pattern uses a construct the running checker cannot model, or
    /// breached a size cap. Steers the hybrid policy to the fuzz path.
    Unsupported(String),
    /// The pattern is not a valid regular expression.
    InvalidRegExp(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            ErrorKind::InvalidRegExp(msg) => write!(f, "invalid regexp: {}", msg),
        }
    }
}

impl std::error::Error for ErrorKind {}

/// A concrete attack input: the expanded witness followed by a terminating
/// character the pattern cannot continue on (when one exists).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackString {
    chars: Vec<char>,
}

impl AttackString {
    pub fn new(chars: Vec<char>) -> Self {
        Self { chars }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl fmt::Display for AttackString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// The outcome of an analysis.
#[derive(Clone, Debug)]
pub enum Diagnostics {
    /// No witness of super-linear matching was found.
    Safe {
        complexity: Option<Complexity>,
        checker: Checker,
    },
    /// The pattern admits catastrophic backtracking; `attack` provokes it.
    Vulnerable {
        attack: AttackString,
        complexity: Option<Complexity>,
        checker: Checker,
    },
    /// The analysis could not decide.
    Unknown {
        error: ErrorKind,
        checker: Option<Checker>,
    },
}

impl Diagnostics {
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Diagnostics::Vulnerable { .. })
    }

    pub fn checker(&self) -> Option<Checker> {
        match self {
            Diagnostics::Safe { checker, .. } | Diagnostics::Vulnerable { checker, .. } => {
                Some(*checker)
            }
            Diagnostics::Unknown { checker, .. } => *checker,
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostics::Safe { complexity, .. } => match complexity {
                Some(c) => write!(f, "safe: {}", c),
                None => write!(f, "safe"),
            },
            Diagnostics::Vulnerable {
                attack, complexity, ..
            } => {
                match complexity {
                    Some(c) => write!(f, "vulnerable: {}", c)?,
                    None => write!(f, "vulnerable")?,
                }
                write!(f, " (attack: {} chars)", attack.len())
            }
            Diagnostics::Unknown { error, .. } => write!(f, "unknown: {}", error),
        }
    }
}
