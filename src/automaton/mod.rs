//! The ambiguity checker: decides matching-time complexity.
//!
//! Works on the square of the ordered NFA. Two distinct runs over the same
//! word show up in the product as either an SCC mixing diagonal and
//! off-diagonal pairs or as a duplicated successor slot inside a looping
//! SCC; both are exponential witnesses (EDA). Without EDA, chains of
//! looping diagonal SCCs connected through off-diagonal pairs bound the
//! polynomial degree (IDA). Every choice is made in a fixed order (SCC,
//! state id, symbol index) so a pattern always yields the same witness.

mod witness;

pub use witness::{Complexity, Witness};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::ErrorKind;
use crate::graph::Graph;
use crate::nfa::OrderedNfa;
use crate::timeout::Timeout;

type ProductVertex = (u32, u32);

fn witness_failed() -> ErrorKind {
    ErrorKind::Unsupported("witness construction failed".to_string())
}

fn base_complexity(is_constant: bool) -> Complexity {
    if is_constant {
        Complexity::Constant
    } else {
        Complexity::Linear
    }
}

/// Classifies the matching-time complexity of an ordered NFA.
pub fn check_automaton(
    nfa: &OrderedNfa<char, u32>,
    is_constant: bool,
    max_nfa_size: usize,
    timeout: &Timeout,
) -> Result<Complexity, ErrorKind> {
    let analysis = match ProductAnalysis::build(nfa, max_nfa_size, timeout)? {
        Some(a) => a,
        // The language is empty; matching fails immediately everywhere.
        None => return Ok(base_complexity(is_constant)),
    };

    if let Some(witness) = analysis.find_eda()? {
        tracing::debug!("found exponential ambiguity");
        return Ok(Complexity::Exponential { witness });
    }
    if let Some((degree, witness)) = analysis.find_ida()? {
        tracing::debug!(degree, "found polynomial ambiguity");
        return Ok(Complexity::Polynomial { degree, witness });
    }
    Ok(base_complexity(is_constant))
}

struct ProductAnalysis<'a> {
    nfa: &'a OrderedNfa<char, u32>,
    timeout: &'a Timeout,
    alive: FxHashSet<u32>,
    /// Transition graph restricted to alive states; used for suffix paths.
    alive_graph: Graph<u32, char>,
    accept_set: FxHashSet<u32>,
    product: Graph<ProductVertex, char>,
    init_diagonals: Vec<ProductVertex>,
    /// Sorted SCCs of the product (each sorted internally).
    sccs: Vec<Vec<ProductVertex>>,
    scc_of: FxHashMap<ProductVertex, usize>,
}

impl<'a> ProductAnalysis<'a> {
    /// Builds the trimmed product. Returns `None` when no accepting path
    /// exists at all.
    fn build(
        nfa: &'a OrderedNfa<char, u32>,
        max_nfa_size: usize,
        timeout: &'a Timeout,
    ) -> Result<Option<Self>, ErrorKind> {
        let full = nfa.to_graph();
        let forward = full.reachable(&nfa.inits, timeout)?;
        let backward = full.reverse().reachable(&nfa.accepts, timeout)?;
        let alive: FxHashSet<u32> = nfa
            .states
            .iter()
            .copied()
            .filter(|q| forward.contains(q) && backward.contains(q))
            .collect();
        let inits: Vec<u32> = nfa
            .inits
            .iter()
            .copied()
            .filter(|q| alive.contains(q))
            .collect();
        if inits.is_empty() {
            return Ok(None);
        }

        let mut alive_graph: Graph<u32, char> = Graph::new();
        for &q in &nfa.states {
            if alive.contains(&q) {
                alive_graph.add_vertex(q);
            }
        }
        for &q in &nfa.states {
            if !alive.contains(&q) {
                continue;
            }
            for &a in &nfa.alphabet {
                if let Some(targets) = nfa.delta.get(&(q, a)) {
                    for &t in targets {
                        if alive.contains(&t) {
                            alive_graph.add_edge(q, a, t);
                        }
                    }
                }
            }
        }

        // Square construction restricted to pairs reachable from the
        // diagonal of the initial states; only those pairs correspond to
        // two runs over the same input.
        let cap = max_nfa_size.saturating_mul(max_nfa_size);
        let mut product: Graph<ProductVertex, char> = Graph::new();
        let init_diagonals: Vec<ProductVertex> = inits.iter().map(|&q| (q, q)).collect();
        let mut seen: FxHashSet<ProductVertex> = init_diagonals.iter().copied().collect();
        let mut queue: std::collections::VecDeque<ProductVertex> =
            init_diagonals.iter().copied().collect();
        for &v in &init_diagonals {
            product.add_vertex(v);
        }
        while let Some((p1, p2)) = queue.pop_front() {
            timeout.check("automaton.product")?;
            for &a in &nfa.alphabet {
                let (t1s, t2s) = match (nfa.delta.get(&(p1, a)), nfa.delta.get(&(p2, a))) {
                    (Some(x), Some(y)) => (x, y),
                    _ => continue,
                };
                for &t1 in t1s {
                    if !alive.contains(&t1) {
                        continue;
                    }
                    for &t2 in t2s {
                        if !alive.contains(&t2) {
                            continue;
                        }
                        product.add_edge((p1, p2), a, (t1, t2));
                        if seen.insert((t1, t2)) {
                            if product.vertex_count() > cap {
                                return Err(ErrorKind::Unsupported(
                                    "MultiNFA size is too large".to_string(),
                                ));
                            }
                            queue.push_back((t1, t2));
                        }
                    }
                }
            }
        }

        let mut sccs = product.scc(timeout)?;
        for c in &mut sccs {
            c.sort_unstable();
        }
        sccs.sort();
        let mut scc_of = FxHashMap::default();
        for (i, c) in sccs.iter().enumerate() {
            for &v in c {
                scc_of.insert(v, i);
            }
        }

        Ok(Some(Self {
            nfa,
            timeout,
            alive,
            alive_graph,
            accept_set: nfa.accepts.iter().copied().collect(),
            product,
            init_diagonals,
            sccs,
            scc_of,
        }))
    }

    fn diagonal_of(scc: &[ProductVertex]) -> Vec<u32> {
        scc.iter()
            .filter(|(a, b)| a == b)
            .map(|&(a, _)| a)
            .collect()
    }

    fn is_loopy(&self, scc: &[ProductVertex]) -> bool {
        if scc.len() > 1 {
            return true;
        }
        let v = scc[0];
        self.product.neighbors(&v).any(|(_, t)| *t == v)
    }

    /// Assembles the witness around pump state `p` with the given pump word.
    fn close_witness(
        &self,
        p: u32,
        prefix: Vec<char>,
        pump: Vec<char>,
    ) -> Result<Witness<char>, ErrorKind> {
        let suffix = self
            .alive_graph
            .path_to_any(&[p], &self.accept_set, self.timeout)?
            .ok_or_else(witness_failed)?;
        Ok(Witness {
            pumps: vec![(prefix, pump)],
            suffix,
        })
    }

    /// Exponential-degree-of-ambiguity search.
    fn find_eda(&self) -> Result<Option<Witness<char>>, ErrorKind> {
        for scc in &self.sccs {
            self.timeout.check("automaton.eda")?;
            let scc_set: FxHashSet<ProductVertex> = scc.iter().copied().collect();
            let diagonal = Self::diagonal_of(scc);
            if diagonal.is_empty() {
                continue;
            }

            // Two runs diverging into different states and meeting again.
            if let Some(&(q1, q2)) = scc.iter().find(|(a, b)| a != b) {
                let p = diagonal[0];
                let there = self
                    .product
                    .path(&[(p, p)], &(q1, q2), self.timeout)?
                    .ok_or_else(witness_failed)?;
                let back = self
                    .product
                    .path(&[(q1, q2)], &(p, p), self.timeout)?
                    .ok_or_else(witness_failed)?;
                let mut pump = there;
                pump.extend(back);
                let prefix = self
                    .product
                    .path(&self.init_diagonals, &(p, p), self.timeout)?
                    .ok_or_else(witness_failed)?;
                return Ok(Some(self.close_witness(p, prefix, pump)?));
            }

            // Two runs using different slots of a duplicated successor.
            for &q in &diagonal {
                for &a in &self.nfa.alphabet {
                    let targets = match self.nfa.delta.get(&(q, a)) {
                        Some(t) => t,
                        None => continue,
                    };
                    for (i, t) in targets.iter().enumerate() {
                        if !targets[..i].contains(t) {
                            continue;
                        }
                        if !self.alive.contains(t) || !scc_set.contains(&(*t, *t)) {
                            continue;
                        }
                        let back = self
                            .product
                            .path(&[(*t, *t)], &(q, q), self.timeout)?
                            .ok_or_else(witness_failed)?;
                        let mut pump = vec![a];
                        pump.extend(back);
                        let prefix = self
                            .product
                            .path(&self.init_diagonals, &(q, q), self.timeout)?
                            .ok_or_else(witness_failed)?;
                        return Ok(Some(self.close_witness(q, prefix, pump)?));
                    }
                }
            }
        }
        Ok(None)
    }

    /// The shortest word looping at `v` in the product, self-loops first.
    fn cycle_at(&self, v: ProductVertex) -> Result<Option<Vec<char>>, ErrorKind> {
        for (label, t) in self.product.neighbors(&v) {
            if *t == v {
                return Ok(Some(vec![*label]));
            }
        }
        for (label, t) in self.product.neighbors(&v) {
            if let Some(rest) = self.product.path(&[*t], &v, self.timeout)? {
                let mut out = vec![*label];
                out.extend(rest);
                return Ok(Some(out));
            }
        }
        Ok(None)
    }

    /// Infinite-degree-of-ambiguity chain search; returns the degree and
    /// witness when the longest chain has length two or more.
    fn find_ida(&self) -> Result<Option<(usize, Witness<char>)>, ErrorKind> {
        // Condense the product into its SCC DAG and use descendant sets to
        // decide reachability between components.
        let mut dag: Graph<usize, ()> = Graph::new();
        for i in 0..self.sccs.len() {
            dag.add_vertex(i);
        }
        let mut dag_edges: FxHashSet<(usize, usize)> = FxHashSet::default();
        for (u, _, v) in self.product.edges() {
            let (su, sv) = (self.scc_of[&u], self.scc_of[&v]);
            if su != sv && dag_edges.insert((su, sv)) {
                dag.add_edge(su, (), sv);
            }
        }
        let reach = dag.reachable_map(self.timeout)?;

        let diagonals: Vec<Vec<u32>> = self.sccs.iter().map(|s| Self::diagonal_of(s)).collect();
        let candidates: Vec<usize> = (0..self.sccs.len())
            .filter(|&i| !diagonals[i].is_empty() && self.is_loopy(&self.sccs[i]))
            .collect();

        // IDA edge C₁ → C₂: some off-diagonal (p, q) sits between the two
        // diagonals in the reachability order.
        let mut edges: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for &ci in &candidates {
            self.timeout.check("automaton.ida")?;
            for &cj in &candidates {
                if ci == cj {
                    continue;
                }
                let found = diagonals[ci].iter().any(|&p| {
                    diagonals[cj].iter().any(|&q| {
                        self.scc_of.get(&(p, q)).is_some_and(|&s_pq| {
                            reach[&ci].contains(&s_pq) && reach[&s_pq].contains(&cj)
                        })
                    })
                });
                if found {
                    edges.entry(ci).or_default().push(cj);
                }
            }
        }

        // Longest chain of candidates; edges follow the DAG order, so the
        // recursion terminates.
        let mut memo: FxHashMap<usize, (usize, Option<usize>)> = FxHashMap::default();
        for &c in &candidates {
            self.chain_len(c, &edges, &mut memo);
        }
        let (&start, &(degree, _)) = match memo
            .iter()
            .max_by_key(|(&c, &(len, _))| (len, std::cmp::Reverse(c)))
        {
            Some(best) => best,
            None => return Ok(None),
        };
        if degree < 2 {
            return Ok(None);
        }

        let mut chain = vec![start];
        let mut cur = start;
        while let Some(&(_, Some(next))) = memo.get(&cur) {
            chain.push(next);
            cur = next;
        }

        let reps: Vec<u32> = chain.iter().map(|&c| diagonals[c][0]).collect();
        let mut pumps: Vec<(Vec<char>, Vec<char>)> = Vec::with_capacity(reps.len());
        let mut prev: Option<u32> = None;
        for &d in &reps {
            let sources: Vec<ProductVertex> = match prev {
                None => self.init_diagonals.clone(),
                Some(p) => vec![(p, p)],
            };
            let prefix = self
                .product
                .path(&sources, &(d, d), self.timeout)?
                .ok_or_else(witness_failed)?;
            let pump = self.cycle_at((d, d))?.ok_or_else(witness_failed)?;
            pumps.push((prefix, pump));
            prev = Some(d);
        }
        let last = *reps.last().ok_or_else(witness_failed)?;
        let suffix = self
            .alive_graph
            .path_to_any(&[last], &self.accept_set, self.timeout)?
            .ok_or_else(witness_failed)?;

        Ok(Some((
            degree,
            Witness {
                pumps,
                suffix,
            },
        )))
    }

    fn chain_len(
        &self,
        c: usize,
        edges: &FxHashMap<usize, Vec<usize>>,
        memo: &mut FxHashMap<usize, (usize, Option<usize>)>,
    ) -> usize {
        if let Some(&(len, _)) = memo.get(&c) {
            return len;
        }
        let mut best = (1, None);
        if let Some(nexts) = edges.get(&c) {
            for &n in nexts {
                let len = 1 + self.chain_len(n, edges, memo);
                if len > best.0 {
                    best = (len, Some(n));
                }
            }
        }
        memo.insert(c, best);
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{compile_eps_nfa, from_eps_nfa};
    use crate::regexp::{parse_flags, parse_pattern};

    fn classify(source: &str) -> Complexity {
        let flags = parse_flags("").unwrap();
        let pattern = parse_pattern(source, flags).unwrap();
        let eps = compile_eps_nfa(&pattern, 10_000, &Timeout::NoTimeout).unwrap();
        let ordered = from_eps_nfa(&eps, 10_000, &Timeout::NoTimeout).unwrap();
        let heads: Vec<char> = eps
            .alphabet
            .iter()
            .map(|a| a.head().unwrap_or('\0'))
            .collect();
        let nfa = ordered.rename().map_alphabet(|&atom| heads[atom]);
        check_automaton(&nfa, pattern.is_constant(), 10_000, &Timeout::NoTimeout).unwrap()
    }

    fn nfa_of(source: &str) -> crate::nfa::OrderedNfa<char, u32> {
        let flags = parse_flags("").unwrap();
        let pattern = parse_pattern(source, flags).unwrap();
        let eps = compile_eps_nfa(&pattern, 10_000, &Timeout::NoTimeout).unwrap();
        let ordered = from_eps_nfa(&eps, 10_000, &Timeout::NoTimeout).unwrap();
        let heads: Vec<char> = eps
            .alphabet
            .iter()
            .map(|a| a.head().unwrap_or('\0'))
            .collect();
        ordered.rename().map_alphabet(|&atom| heads[atom])
    }

    #[test]
    fn test_duplicated_alternation_is_exponential() {
        assert!(matches!(
            classify("^(a|a)*$"),
            Complexity::Exponential { .. }
        ));
    }

    #[test]
    fn test_nested_star_is_exponential() {
        assert!(matches!(classify("^(a*)*$"), Complexity::Exponential { .. }));
    }

    #[test]
    fn test_nested_plus_is_exponential() {
        assert!(matches!(classify("^(a+)+$"), Complexity::Exponential { .. }));
    }

    #[test]
    fn test_single_star_is_linear() {
        assert_eq!(classify("^a*b$"), Complexity::Linear);
    }

    #[test]
    fn test_literal_is_constant() {
        assert_eq!(classify("^abc$"), Complexity::Constant);
    }

    #[test]
    fn test_bounded_repeat_is_linear() {
        assert_eq!(classify("^a{3,5}b$"), Complexity::Linear);
    }

    #[test]
    fn test_triple_star_is_cubic() {
        match classify("^a*a*a*b$") {
            Complexity::Polynomial { degree, .. } => assert_eq!(degree, 3),
            other => panic!("expected polynomial, got {:?}", other),
        }
    }

    #[test]
    fn test_double_star_is_quadratic() {
        match classify("^a*a*b$") {
            Complexity::Polynomial { degree, .. } => assert_eq!(degree, 2),
            other => panic!("expected polynomial, got {:?}", other),
        }
    }

    #[test]
    fn test_exponential_witness_is_accepted_by_nfa() {
        let nfa = nfa_of("^(a|a)*$");
        match classify("^(a|a)*$") {
            Complexity::Exponential { witness } => {
                for n in 1..4 {
                    let word = witness.build_attack(n);
                    assert!(
                        nfa.accepts_word(&word),
                        "attack at n={} must stay in the language",
                        n
                    );
                }
            }
            other => panic!("expected exponential, got {:?}", other),
        }
    }

    #[test]
    fn test_polynomial_witness_is_accepted_by_nfa() {
        let nfa = nfa_of("^a*a*a*b$");
        match classify("^a*a*a*b$") {
            Complexity::Polynomial { witness, .. } => {
                for n in 1..4 {
                    let word = witness.build_attack(n);
                    assert!(nfa.accepts_word(&word));
                }
            }
            other => panic!("expected polynomial, got {:?}", other),
        }
    }

    #[test]
    fn test_deterministic_witness() {
        let a = classify("^(a|a)*$");
        let b = classify("^(a|a)*$");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_language_is_safe() {
        // `$` mid-pattern makes the language empty; no repetition, so the
        // verdict falls back to constant.
        assert_eq!(classify("^a$b$"), Complexity::Constant);
        // Same shape with a star still cannot blow up.
        assert_eq!(classify("^a*$b$"), Complexity::Linear);
    }
}
