//! Fuzzing-based checker: coverage-and-rate-guided genetic search for slow
//! inputs, with the backtracking VM as the fitness oracle.
//!
//! Candidates are [`FString`]s so a promising input can be scaled through
//! its repetition parameter. A candidate that exhausts the population step
//! budget is escalated by `try_attack`, which rescales it under the attack
//! budget, first assuming exponential growth and then descending
//! polynomial degrees.

mod fstring;
mod seeder;

pub use fstring::{Element, FString};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

use crate::backtrack::{
    compile_ir, run, CoverageItem, FuzzTracer, LimitTracer, Program, VmError,
};
use crate::config::Config;
use crate::diagnostics::AttackString;
use crate::diagnostics::ErrorKind;
use crate::regexp::{Node, Pattern};
use crate::timeout::Timeout;

/// Maximal literal runs in the pattern; seeds and one mutator use them.
pub fn literal_parts(node: &Node) -> Vec<Vec<char>> {
    fn walk(node: &Node, out: &mut Vec<Vec<char>>) {
        match node {
            Node::Sequence(children) => {
                let mut current: Vec<char> = Vec::new();
                for child in children {
                    if let Node::Character(c) = child {
                        current.push(*c);
                    } else {
                        if current.len() >= 2 {
                            out.push(std::mem::take(&mut current));
                        }
                        current.clear();
                        walk(child, out);
                    }
                }
                if current.len() >= 2 {
                    out.push(current);
                }
            }
            Node::Disjunction(children) => {
                for child in children {
                    walk(child, out);
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
            | Node::LookBehind(_, child) => walk(child, out),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(node, &mut out);
    out
}

#[derive(Clone, Debug)]
struct Trace {
    str: FString,
    rate: f64,
    steps: usize,
    coverage: FxHashSet<CoverageItem>,
}

/// An immutable, rate-sorted snapshot of the best candidates so far.
struct Generation {
    min_rate: f64,
    traces: Vec<Trace>,
    inputs: FxHashSet<Vec<char>>,
    covered: FxHashSet<CoverageItem>,
}

/// The mutable working set of one iteration.
struct Population {
    init: bool,
    min_rate: f64,
    traces: Vec<Trace>,
    inputs: FxHashSet<Vec<char>>,
    visited: FxHashSet<CoverageItem>,
}

impl Population {
    fn initial() -> Self {
        Self {
            init: true,
            min_rate: 0.0,
            traces: Vec::new(),
            inputs: FxHashSet::default(),
            visited: FxHashSet::default(),
        }
    }

    fn from_generation(generation: &Generation) -> Self {
        Self {
            init: false,
            min_rate: generation.min_rate,
            traces: generation.traces.clone(),
            inputs: generation.inputs.clone(),
            visited: generation.covered.clone(),
        }
    }

    fn into_generation(mut self, max_size: usize) -> Generation {
        self.traces.sort_by(|a, b| {
            b.rate
                .partial_cmp(&a.rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.steps.cmp(&a.steps))
        });
        self.traces.truncate(max_size);
        let min_rate = self.traces.last().map(|t| t.rate).unwrap_or(0.0);
        Generation {
            min_rate,
            traces: self.traces,
            inputs: self.inputs,
            covered: self.visited,
        }
    }
}

/// Searches for an input that blows the attack budget. `Ok(None)` means no
/// such input was found within the iteration budget.
pub fn check_fuzz(
    pattern: &Pattern,
    config: &Config,
    timeout: &Timeout,
) -> Result<Option<AttackString>, ErrorKind> {
    let program = compile_ir(pattern)?;
    let parts = literal_parts(&pattern.node);
    let pool = seeder::interesting_chars(&program);
    let mut checker = FuzzChecker {
        program,
        parts,
        pool,
        config,
        timeout,
        rng: SmallRng::seed_from_u64(config.seed),
    };
    Ok(checker
        .search()?
        .map(|fs| AttackString::new(fs.to_ustring())))
}

struct FuzzChecker<'a> {
    program: Program,
    parts: Vec<Vec<char>>,
    pool: Vec<char>,
    config: &'a Config,
    timeout: &'a Timeout,
    rng: SmallRng,
}

impl FuzzChecker<'_> {
    fn search(&mut self) -> Result<Option<FString>, ErrorKind> {
        let seeds = seeder::seeds(
            &self.program,
            &self.parts,
            self.config.seed_limit,
            self.config.max_seed_size,
        );
        tracing::debug!(seeds = seeds.len(), "fuzz seeding");
        let mut population = Population::initial();
        for seed in seeds {
            if let Some(attack) = self.execute(&mut population, seed)? {
                return Ok(Some(attack));
            }
        }
        let mut generation = population.into_generation(self.config.max_generation_size);

        for iteration in 0..self.config.max_iteration {
            if generation.traces.is_empty() {
                break;
            }
            tracing::debug!(
                iteration,
                traces = generation.traces.len(),
                min_rate = generation.min_rate,
                "fuzz iteration"
            );
            let mut population = Population::from_generation(&generation);

            for _ in 0..self.config.cross_size {
                if generation.traces.len() < 2 {
                    break;
                }
                let i = self.rng.gen_range(0..generation.traces.len());
                let j = self.rng.gen_range(0..generation.traces.len());
                let pos1 = self.rng.gen_range(0..=generation.traces[i].str.size());
                let pos2 = self.rng.gen_range(0..=generation.traces[j].str.size());
                let (first, second) =
                    generation.traces[i]
                        .str
                        .cross(&generation.traces[j].str, pos1, pos2);
                for candidate in [first, second] {
                    if let Some(attack) = self.execute(&mut population, candidate)? {
                        return Ok(Some(attack));
                    }
                }
            }

            for _ in 0..self.config.mutate_size {
                let candidate = self.mutate(&generation);
                if let Some(candidate) = candidate {
                    if let Some(attack) = self.execute(&mut population, candidate)? {
                        return Ok(Some(attack));
                    }
                }
            }

            generation = population.into_generation(self.config.max_generation_size);
        }
        Ok(None)
    }

    /// Runs one candidate: dedupe, trace, escalate on budget exhaustion,
    /// otherwise admit by rate or coverage novelty.
    fn execute(
        &mut self,
        population: &mut Population,
        candidate: FString,
    ) -> Result<Option<FString>, ErrorKind> {
        self.timeout.check("fuzz.execute")?;
        let input = candidate.to_ustring();
        if !population.inputs.insert(input.clone()) {
            return Ok(None);
        }
        let mut tracer = FuzzTracer::new(self.config.population_limit);
        match run(&self.program, &input, &mut tracer) {
            Ok(_) => {
                let steps = tracer.steps();
                let rate = tracer.rate(input.len());
                let coverage = tracer.into_coverage();
                let novel = !coverage.is_subset(&population.visited);
                if population.init || rate >= population.min_rate || novel {
                    population.visited.extend(coverage.iter().copied());
                    population.traces.push(Trace {
                        str: candidate,
                        rate,
                        steps,
                        coverage,
                    });
                }
                Ok(None)
            }
            Err(VmError::Limit) => {
                if let Some(attack) = self.try_attack(&candidate)? {
                    return Ok(Some(attack));
                }
                // Over budget but not provably catastrophic; keep it as a
                // hot trace so its offspring stay in the pool.
                let steps = tracer.steps();
                let rate = tracer.rate(input.len());
                let coverage = tracer.into_coverage();
                population.visited.extend(coverage.iter().copied());
                population.traces.push(Trace {
                    str: candidate,
                    rate,
                    steps,
                    coverage,
                });
                Ok(None)
            }
        }
    }

    /// Rescales a hot candidate under the attack budget: exponential
    /// assumption first, then polynomial degrees from `max_degree` down.
    fn try_attack(&mut self, candidate: &FString) -> Result<Option<FString>, ErrorKind> {
        let limit = self.config.attack_limit;
        let base = candidate.n.max(1) as f64;
        let mut attempts: Vec<usize> = Vec::new();
        if candidate.is_constant() {
            attempts.push(candidate.n);
        } else {
            let r = ((limit as f64).log2() / base).max(1.0);
            attempts.push((base * r).ceil() as usize);
            for degree in (2..=self.config.max_degree).rev() {
                let r = (limit as f64).powf(1.0 / degree as f64) / base;
                if r >= 1.0 {
                    attempts.push((base * r).ceil() as usize);
                }
            }
        }
        for n in attempts {
            self.timeout.check("fuzz.attack")?;
            let scaled = candidate.with_n(n);
            let input = scaled.to_ustring();
            if input.len() > self.config.max_attack_size {
                continue;
            }
            let mut tracer = LimitTracer::new(limit);
            if let Err(VmError::Limit) = run(&self.program, &input, &mut tracer) {
                tracing::debug!(n, len = input.len(), "fuzz attack confirmed");
                return Ok(Some(scaled));
            }
        }
        Ok(None)
    }

    fn random_element(&mut self, size_bound: usize) -> Element {
        if !self.pool.is_empty() && (size_bound == 0 || self.rng.gen_bool(0.5)) {
            let c = self.pool[self.rng.gen_range(0..self.pool.len())];
            Element::Wrap(c)
        } else if size_bound == 0 {
            Element::Wrap('a')
        } else {
            Element::Repeat(self.rng.gen_range(0..10), self.rng.gen_range(0..size_bound))
        }
    }

    /// One of the six mutators, picked uniformly.
    fn mutate(&mut self, generation: &Generation) -> Option<FString> {
        if generation.traces.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..generation.traces.len());
        let target = generation.traces[pick].str.clone();
        match self.rng.gen_range(0..6) {
            // mutate_repeat
            0 => {
                if self.rng.gen_bool(0.5) {
                    let delta = self.rng.gen_range(-10i64..=10);
                    Some(target.map_n(|n| (n as i64 + delta).max(1) as usize))
                } else {
                    Some(target.map_n(|n| n.saturating_mul(2)))
                }
            }
            // mutate_insert
            1 => {
                let pos = self.rng.gen_range(0..=target.size());
                let element = self.random_element(target.size());
                Some(target.insert_at(pos, element))
            }
            // mutate_insert_part
            2 => {
                if self.parts.is_empty() {
                    return None;
                }
                let part = &self.parts[self.rng.gen_range(0..self.parts.len())];
                let mut elements: Vec<Element> =
                    part.iter().copied().map(Element::Wrap).collect();
                if self.rng.gen_bool(0.5) {
                    elements.push(Element::Repeat(
                        self.rng.gen_range(1..10),
                        part.len(),
                    ));
                }
                let pos = self.rng.gen_range(0..=target.size());
                Some(target.insert_all_at(pos, &elements))
            }
            // mutate_update
            3 => {
                if target.size() == 0 {
                    return None;
                }
                let pos = self.rng.gen_range(0..target.size());
                let element = self.random_element(target.size());
                Some(target.replace_at(pos, element))
            }
            // mutate_copy
            4 => {
                if target.size() == 0 {
                    return None;
                }
                let from = self.rng.gen_range(0..target.size());
                let len = self.rng.gen_range(1..=(target.size() - from));
                let slice: Vec<Element> = target.elements()[from..from + len].to_vec();
                let pos = self.rng.gen_range(0..=target.size());
                Some(target.insert_all_at(pos, &slice))
            }
            // mutate_delete
            _ => {
                if target.size() < 2 {
                    return None;
                }
                let pos = self.rng.gen_range(0..target.size());
                let len = self.rng.gen_range(1..=(target.size() - pos));
                Some(target.delete(pos, len))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regexp::{parse_flags, parse_pattern};

    fn fuzz(source: &str, flags: &str) -> Option<AttackString> {
        let pattern = parse_pattern(source, parse_flags(flags).unwrap()).unwrap();
        let config = Config::default();
        check_fuzz(&pattern, &config, &Timeout::NoTimeout).unwrap()
    }

    #[test]
    fn test_literal_parts() {
        let p = parse_pattern("^foo(bar|x)*baz$", parse_flags("").unwrap()).unwrap();
        let parts = literal_parts(&p.node);
        assert!(parts.contains(&vec!['f', 'o', 'o']));
        assert!(parts.contains(&vec!['b', 'a', 'r']));
        assert!(parts.contains(&vec!['b', 'a', 'z']));
    }

    #[test]
    fn test_finds_exponential_blowup() {
        let attack = fuzz("^(a+)+$", "");
        assert!(attack.is_some(), "nested plus must be flagged");
        let attack = attack.unwrap();
        assert!(attack.len() <= Config::default().max_attack_size);
    }

    #[test]
    fn test_safe_pattern_yields_none() {
        assert!(fuzz("^abc$", "").is_none());
        assert!(fuzz("^a*b$", "").is_none());
    }

    #[test]
    fn test_lookahead_pattern_is_searchable() {
        // The automaton path refuses lookarounds; the fuzz path runs them.
        let attack = fuzz("^(?=a)(a+)+$", "");
        assert!(attack.is_some());
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = fuzz("^(a|a)*$", "");
        let b = fuzz("^(a|a)*$", "");
        match (a, b) {
            (Some(x), Some(y)) => assert_eq!(x, y),
            (None, None) => {}
            other => panic!("nondeterministic outcome: {:?}", other),
        }
    }
}
