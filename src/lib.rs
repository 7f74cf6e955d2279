//! redoscope: ReDoS analysis for ECMA-262 regular expressions.
//!
//! Decides whether a pattern is vulnerable to catastrophic backtracking
//! and, when it is, produces a concrete attack string. Two checkers share
//! the work:
//!
//! - The **automaton** checker compiles the pattern into an ordered NFA
//!   and classifies matching-time complexity (constant, linear,
//!   polynomial, exponential) by product-automaton ambiguity analysis,
//!   returning a symbolic witness on vulnerability.
//! - The **fuzz** checker drives a backtracking VM with a genetic search
//!   over candidate inputs, for patterns the automaton path cannot model
//!   (lookaround, back-references, oversized NFAs).
//!
//! The default hybrid policy tries the automaton first and falls back to
//! fuzzing.
//!
//! ```
//! use redoscope::{check, Config, Diagnostics};
//!
//! let diagnostics = check("^(a|a)*$", "", &Config::default());
//! assert!(matches!(diagnostics, Diagnostics::Vulnerable { .. }));
//!
//! let diagnostics = check("^abc$", "", &Config::default());
//! assert!(matches!(diagnostics, Diagnostics::Safe { .. }));
//! ```
//!
//! The safety claim is relative to the backtracking semantics modeled
//! here: a "safe" verdict says no super-linear blowup exists for a
//! canonical backtracking matcher, not for every engine.

mod automaton;
mod backtrack;
mod chars;
mod checker;
mod config;
mod diagnostics;
mod fuzz;
mod graph;
mod nfa;
mod regexp;
mod timeout;
mod unicode;

pub use automaton::{Complexity, Witness};
pub use checker::check;
pub use config::Config;
pub use diagnostics::{AttackString, Checker, Diagnostics, ErrorKind};
pub use regexp::SyntaxError;
pub use timeout::Timeout;
