//! Analysis configuration.

use std::time::Duration;

use crate::diagnostics::Checker;

/// Tunable knobs for one analysis. The defaults are safe for interactive
/// use; raising the budgets trades time for a sharper verdict.
#[derive(Clone, Debug)]
pub struct Config {
    /// Which checker to run; hybrid tries the automaton first and falls
    /// back to fuzzing on `Unsupported`.
    pub checker: Checker,
    /// Wall-clock budget; `None` disables the deadline.
    pub timeout: Option<Duration>,
    /// Upper bound on the length of any emitted attack string.
    pub max_attack_size: usize,
    /// VM step budget treated as catastrophic.
    pub attack_limit: usize,
    /// Scale factor for polynomial attack sizing; absorbs the constant
    /// work per backtracking step.
    pub step_rate: f64,
    /// Hard cap on ordered-NFA state count.
    pub max_nfa_size: usize,
    /// Hybrid cutoff: total bounded-repetition count.
    pub max_repeat_count: usize,
    /// Hybrid cutoff: weighted pattern size.
    pub max_pattern_size: usize,
    /// Fuzzing: maximum number of seeds.
    pub seed_limit: usize,
    /// Fuzzing: VM step budget during the search phase.
    pub population_limit: usize,
    /// Fuzzing: crossover invocations per generation.
    pub cross_size: usize,
    /// Fuzzing: mutator invocations per generation.
    pub mutate_size: usize,
    /// Fuzzing: maximum seed length in characters.
    pub max_seed_size: usize,
    /// Fuzzing: survivors kept per generation.
    pub max_generation_size: usize,
    /// Fuzzing: generation count before giving up.
    pub max_iteration: usize,
    /// Fuzzing: highest polynomial degree tried when scaling an attack.
    pub max_degree: usize,
    /// PRNG seed; a fixed seed reproduces a run exactly.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checker: Checker::Hybrid,
            timeout: Some(Duration::from_secs(10)),
            max_attack_size: 10_000,
            attack_limit: 1_000_000,
            step_rate: 4.0,
            max_nfa_size: 35_000,
            max_repeat_count: 30,
            max_pattern_size: 1_500,
            seed_limit: 10_000,
            population_limit: 100_000,
            cross_size: 25,
            mutate_size: 50,
            max_seed_size: 100,
            max_generation_size: 100,
            max_iteration: 30,
            max_degree: 4,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.checker, Checker::Hybrid);
        assert_eq!(c.max_attack_size, 10_000);
        assert_eq!(c.attack_limit, 1_000_000);
        assert_eq!(c.max_repeat_count, 30);
        assert_eq!(c.max_iteration, 30);
    }
}
