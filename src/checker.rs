//! The analysis frontend: routing, attack construction, and the hybrid
//! fallback policy.

use crate::automaton::{check_automaton, Complexity, Witness};
use crate::backtrack::{compile_ir, run, LimitTracer, VmError};
use crate::config::Config;
use crate::diagnostics::{AttackString, Checker, Diagnostics, ErrorKind};
use crate::nfa::{compile_eps_nfa, from_eps_nfa, referenced_chars};
use crate::regexp::{parse_flags, parse_pattern, Pattern};
use crate::timeout::Timeout;

/// Analyzes a pattern source and flags string.
pub fn check(source: &str, flags: &str, config: &Config) -> Diagnostics {
    let timeout = Timeout::from_duration(config.timeout);
    let flag_set = match parse_flags(flags) {
        Ok(f) => f,
        Err(e) => {
            return Diagnostics::Unknown {
                error: ErrorKind::InvalidRegExp(e.to_string()),
                checker: None,
            }
        }
    };
    let pattern = match parse_pattern(source, flag_set) {
        Ok(p) => p,
        Err(e) => {
            return Diagnostics::Unknown {
                error: ErrorKind::InvalidRegExp(e.to_string()),
                checker: None,
            }
        }
    };
    tracing::debug!(source, flags, checker = %config.checker, "checking pattern");

    match config.checker {
        Checker::Automaton => match automaton_path(&pattern, config, &timeout) {
            Ok(d) => d,
            Err(error) => Diagnostics::Unknown {
                error,
                checker: Some(Checker::Automaton),
            },
        },
        Checker::Fuzz => match fuzz_path(&pattern, config, &timeout) {
            Ok(d) => d,
            Err(error) => Diagnostics::Unknown {
                error,
                checker: Some(Checker::Fuzz),
            },
        },
        Checker::Hybrid => hybrid_path(&pattern, config, &timeout),
    }
}

/// Automaton first; recover from `Unsupported` exactly once by fuzzing.
/// Oversized patterns skip the automaton outright.
fn hybrid_path(pattern: &Pattern, config: &Config, timeout: &Timeout) -> Diagnostics {
    let skip_automaton = pattern.repeat_count() >= config.max_repeat_count
        || pattern.size() >= config.max_pattern_size;
    if !skip_automaton {
        match automaton_path(pattern, config, timeout) {
            Ok(d) => return d,
            Err(ErrorKind::Unsupported(msg)) => {
                tracing::debug!(reason = %msg, "automaton unsupported, falling back to fuzz");
            }
            Err(error) => {
                return Diagnostics::Unknown {
                    error,
                    checker: Some(Checker::Automaton),
                }
            }
        }
    } else {
        tracing::debug!(
            repeat_count = pattern.repeat_count(),
            size = pattern.size(),
            "pattern too large for automaton, fuzzing directly"
        );
    }
    match fuzz_path(pattern, config, timeout) {
        Ok(d) => d,
        Err(error) => Diagnostics::Unknown {
            error,
            checker: Some(Checker::Fuzz),
        },
    }
}

fn automaton_path(
    pattern: &Pattern,
    config: &Config,
    timeout: &Timeout,
) -> Result<Diagnostics, ErrorKind> {
    let eps = compile_eps_nfa(pattern, config.max_nfa_size, timeout)?;
    let ordered = from_eps_nfa(&eps, config.max_nfa_size, timeout)?;
    let heads: Vec<char> = eps
        .alphabet
        .iter()
        .map(|atom| atom.head().unwrap_or('\0'))
        .collect();
    let nfa = ordered.rename().map_alphabet(|&atom| heads[atom]);
    let complexity = check_automaton(&nfa, pattern.is_constant(), config.max_nfa_size, timeout)?;
    tracing::debug!(complexity = %complexity, "automaton verdict");
    match &complexity {
        Complexity::Constant | Complexity::Linear => Ok(Diagnostics::Safe {
            complexity: Some(complexity),
            checker: Checker::Automaton,
        }),
        Complexity::Exponential { witness } => {
            let attack = build_attack(pattern, witness, true, 0, config, timeout)?;
            Ok(Diagnostics::Vulnerable {
                attack,
                complexity: Some(complexity.clone()),
                checker: Checker::Automaton,
            })
        }
        Complexity::Polynomial { degree, witness } => {
            let attack = build_attack(pattern, witness, false, *degree, config, timeout)?;
            Ok(Diagnostics::Vulnerable {
                attack,
                complexity: Some(complexity.clone()),
                checker: Checker::Automaton,
            })
        }
    }
}

fn fuzz_path(
    pattern: &Pattern,
    config: &Config,
    timeout: &Timeout,
) -> Result<Diagnostics, ErrorKind> {
    match crate::fuzz::check_fuzz(pattern, config, timeout)? {
        Some(attack) => Ok(Diagnostics::Vulnerable {
            attack,
            complexity: None,
            checker: Checker::Fuzz,
        }),
        None => Ok(Diagnostics::Safe {
            complexity: None,
            checker: Checker::Fuzz,
        }),
    }
}

/// A character the pattern never names, appended so the expanded witness
/// fails to match and forces full backtracking. `None` when the pattern
/// references every printable candidate.
fn terminator_char(pattern: &Pattern) -> Option<char> {
    let referenced = referenced_chars(pattern);
    ('!'..='~').find(|&c| !referenced.contains(c))
}

/// Expands a witness into a concrete attack and validates it against the
/// VM, doubling the pump count until the step budget trips or the size cap
/// is reached.
fn build_attack(
    pattern: &Pattern,
    witness: &Witness<char>,
    exponential: bool,
    degree: usize,
    config: &Config,
    timeout: &Timeout,
) -> Result<AttackString, ErrorKind> {
    let pump = witness.pump_total().max(1) as f64;
    let limit = config.attack_limit as f64;
    // The exponential bound doubles the minimum so per-path constants
    // cannot leave the expansion just under the budget.
    let n0 = if exponential {
        ((limit.log2() / pump).ceil() as usize).max(1) * 2
    } else {
        ((config.step_rate * limit.powf(1.0 / degree.max(2) as f64) / pump).ceil() as usize)
            .max(1)
    };
    let terminator = terminator_char(pattern);
    let budget = config.max_attack_size.saturating_sub(terminator.map_or(0, |_| 1));
    let n_cap = witness.max_n_for(budget);

    let program = compile_ir(pattern)?;
    let mut n = n0.min(n_cap);
    loop {
        timeout.check("checker.validate")?;
        let mut chars = witness.build_attack(n);
        if let Some(t) = terminator {
            chars.push(t);
        }
        let mut tracer = LimitTracer::new(config.attack_limit);
        match run(&program, &chars, &mut tracer) {
            Err(VmError::Limit) => {
                tracing::debug!(n, len = chars.len(), "attack validated");
                return Ok(AttackString::new(chars));
            }
            Ok(_) => {
                if n >= n_cap {
                    // The witness is structurally sound but the budget is
                    // out of reach within the size cap; emit the largest
                    // expansion anyway.
                    tracing::debug!(n, steps = tracer.steps(), "attack under budget at size cap");
                    return Ok(AttackString::new(chars));
                }
                n = (n * 2).min(n_cap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_with(source: &str, flags: &str, checker: Checker) -> Diagnostics {
        let config = Config {
            checker,
            timeout: None,
            ..Config::default()
        };
        check(source, flags, &config)
    }

    #[test]
    fn test_invalid_pattern() {
        let d = check_with("(a", "", Checker::Hybrid);
        assert!(matches!(
            d,
            Diagnostics::Unknown {
                error: ErrorKind::InvalidRegExp(_),
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_flags() {
        let d = check_with("a", "z", Checker::Hybrid);
        assert!(matches!(
            d,
            Diagnostics::Unknown {
                error: ErrorKind::InvalidRegExp(_),
                ..
            }
        ));
    }

    #[test]
    fn test_automaton_only_rejects_lookahead() {
        let d = check_with("(?=x)a*", "", Checker::Automaton);
        match d {
            Diagnostics::Unknown {
                error: ErrorKind::Unsupported(msg),
                checker,
            } => {
                assert_eq!(msg, "look-ahead assertion");
                assert_eq!(checker, Some(Checker::Automaton));
            }
            other => panic!("expected unsupported, got {:?}", other),
        }
    }

    #[test]
    fn test_hybrid_recovers_from_lookahead() {
        let d = check_with("(?=a)abc", "", Checker::Hybrid);
        match d {
            Diagnostics::Safe { checker, .. } => assert_eq!(checker, Checker::Fuzz),
            Diagnostics::Vulnerable { .. } => panic!("constant pattern flagged vulnerable"),
            Diagnostics::Unknown { error, .. } => panic!("hybrid failed: {}", error),
        }
    }

    #[test]
    fn test_terminator_avoids_referenced_chars() {
        let p = parse_pattern("^(a|a)*$", parse_flags("").unwrap()).unwrap();
        let t = terminator_char(&p).unwrap();
        assert_ne!(t, 'a');
    }

    #[test]
    fn test_large_repeat_count_goes_to_fuzz() {
        let d = check_with("^a{40}b{40}$", "", Checker::Hybrid);
        match d {
            Diagnostics::Safe { checker, .. } => assert_eq!(checker, Checker::Fuzz),
            other => panic!("expected safe-by-fuzz, got {:?}", other),
        }
    }
}
