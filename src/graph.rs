//! Directed labeled multigraph with the traversals the checker needs.
//!
//! Vertices are interned in first-seen order so every traversal is
//! deterministic for a given construction order. Traversals use explicit
//! work stacks; pathological patterns produce deep graphs and must not
//! exhaust the call stack.

use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

use crate::diagnostics::ErrorKind;
use crate::timeout::Timeout;

/// A directed multigraph with labeled edges. Duplicate edges are kept;
/// they carry meaning (distinct backtracking routes).
#[derive(Clone, Debug)]
pub struct Graph<V, L> {
    verts: Vec<V>,
    index: FxHashMap<V, usize>,
    adj: Vec<Vec<(L, usize)>>,
}

impl<V, L> Default for Graph<V, L>
where
    V: Clone + Eq + Hash,
    L: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, L> Graph<V, L>
where
    V: Clone + Eq + Hash,
    L: Clone,
{
    pub fn new() -> Self {
        Self {
            verts: Vec::new(),
            index: FxHashMap::default(),
            adj: Vec::new(),
        }
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (V, L, V)>) -> Self {
        let mut g = Self::new();
        for (from, label, to) in edges {
            g.add_edge(from, label, to);
        }
        g
    }

    /// Interns a vertex without requiring an incident edge.
    pub fn add_vertex(&mut self, v: V) -> usize {
        match self.index.get(&v) {
            Some(&i) => i,
            None => {
                let i = self.verts.len();
                self.index.insert(v.clone(), i);
                self.verts.push(v);
                self.adj.push(Vec::new());
                i
            }
        }
    }

    pub fn add_edge(&mut self, from: V, label: L, to: V) {
        let f = self.add_vertex(from);
        let t = self.add_vertex(to);
        self.adj[f].push((label, t));
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    pub fn vertices(&self) -> &[V] {
        &self.verts
    }

    pub fn contains(&self, v: &V) -> bool {
        self.index.contains_key(v)
    }

    /// Ordered successors of `v` with labels.
    pub fn neighbors<'a>(&'a self, v: &V) -> impl Iterator<Item = (&'a L, &'a V)> + 'a {
        let list = self.index.get(v).map(|&i| self.adj[i].as_slice());
        list.unwrap_or(&[])
            .iter()
            .map(move |(l, t)| (l, &self.verts[*t]))
    }

    pub fn edges(&self) -> Vec<(V, L, V)> {
        let mut out = Vec::new();
        for (i, list) in self.adj.iter().enumerate() {
            for (l, t) in list {
                out.push((self.verts[i].clone(), l.clone(), self.verts[*t].clone()));
            }
        }
        out
    }

    /// The graph with every edge's endpoints swapped.
    pub fn reverse(&self) -> Graph<V, L> {
        let mut g = Graph::new();
        for v in &self.verts {
            g.add_vertex(v.clone());
        }
        for (i, list) in self.adj.iter().enumerate() {
            for (l, t) in list {
                g.add_edge(self.verts[*t].clone(), l.clone(), self.verts[i].clone());
            }
        }
        g
    }

    /// Strongly connected components by Tarjan's algorithm. A lone vertex is
    /// its own (trivial) component; it is non-trivial only via a self-loop.
    pub fn scc(&self, timeout: &Timeout) -> Result<Vec<Vec<V>>, ErrorKind> {
        let n = self.verts.len();
        let mut idx: Vec<Option<u32>> = vec![None; n];
        let mut low: Vec<u32> = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut work: Vec<(usize, usize)> = Vec::new();
        let mut clock = 0u32;
        let mut components = Vec::new();

        for root in 0..n {
            if idx[root].is_some() {
                continue;
            }
            idx[root] = Some(clock);
            low[root] = clock;
            clock += 1;
            stack.push(root);
            on_stack[root] = true;
            work.push((root, 0));

            loop {
                timeout.check("graph.scc")?;
                let (v, pos) = match work.last_mut() {
                    Some(frame) => {
                        let out = *frame;
                        frame.1 += 1;
                        out
                    }
                    None => break,
                };
                if pos < self.adj[v].len() {
                    let w = self.adj[v][pos].1;
                    match idx[w] {
                        None => {
                            idx[w] = Some(clock);
                            low[w] = clock;
                            clock += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            work.push((w, 0));
                        }
                        Some(w_idx) => {
                            if on_stack[w] && w_idx < low[v] {
                                low[v] = w_idx;
                            }
                        }
                    }
                } else {
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        if low[v] < low[parent] {
                            low[parent] = low[v];
                        }
                    }
                    if Some(low[v]) == idx[v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("tarjan stack underflow");
                            on_stack[w] = false;
                            component.push(self.verts[w].clone());
                            if w == v {
                                break;
                            }
                        }
                        components.push(component);
                    }
                }
            }
        }
        Ok(components)
    }

    /// Shortest label path from any of `sources` to a vertex satisfying
    /// `targets`; `None` if unreachable, empty if a source already matches.
    pub fn path_to_any(
        &self,
        sources: &[V],
        targets: &FxHashSet<V>,
        timeout: &Timeout,
    ) -> Result<Option<Vec<L>>, ErrorKind> {
        let mut prev: Vec<Option<(usize, L)>> = vec![None; self.verts.len()];
        let mut seen = vec![false; self.verts.len()];
        let mut queue = std::collections::VecDeque::new();

        for s in sources {
            if targets.contains(s) {
                return Ok(Some(Vec::new()));
            }
            if let Some(&i) = self.index.get(s) {
                if !seen[i] {
                    seen[i] = true;
                    queue.push_back(i);
                }
            }
        }

        while let Some(v) = queue.pop_front() {
            timeout.check("graph.path")?;
            for (l, t) in &self.adj[v] {
                if seen[*t] {
                    continue;
                }
                seen[*t] = true;
                prev[*t] = Some((v, l.clone()));
                if targets.contains(&self.verts[*t]) {
                    // Walk the parent chain back to a source.
                    let mut labels = Vec::new();
                    let mut cur = *t;
                    while let Some((p, l)) = prev[cur].take() {
                        labels.push(l);
                        cur = p;
                    }
                    labels.reverse();
                    return Ok(Some(labels));
                }
                queue.push_back(*t);
            }
        }
        Ok(None)
    }

    /// Shortest label path from any of `sources` to `target`.
    pub fn path(
        &self,
        sources: &[V],
        target: &V,
        timeout: &Timeout,
    ) -> Result<Option<Vec<L>>, ErrorKind> {
        let mut targets = FxHashSet::default();
        targets.insert(target.clone());
        self.path_to_any(sources, &targets, timeout)
    }

    /// The subgraph induced by vertices reachable from `init`.
    pub fn reachable(&self, init: &[V], timeout: &Timeout) -> Result<Graph<V, L>, ErrorKind> {
        let mut seen = vec![false; self.verts.len()];
        let mut stack: Vec<usize> = Vec::new();
        for s in init {
            if let Some(&i) = self.index.get(s) {
                if !seen[i] {
                    seen[i] = true;
                    stack.push(i);
                }
            }
        }
        let mut order = Vec::new();
        while let Some(v) = stack.pop() {
            timeout.check("graph.reachable")?;
            order.push(v);
            for (_, t) in &self.adj[v] {
                if !seen[*t] {
                    seen[*t] = true;
                    stack.push(*t);
                }
            }
        }
        order.sort_unstable();

        let mut g = Graph::new();
        for &v in &order {
            g.add_vertex(self.verts[v].clone());
        }
        for &v in &order {
            for (l, t) in &self.adj[v] {
                if seen[*t] {
                    g.add_edge(self.verts[v].clone(), l.clone(), self.verts[*t].clone());
                }
            }
        }
        Ok(g)
    }

    /// Per-vertex descendant sets, including the vertex itself. Requires an
    /// acyclic graph; behavior on cycles is unspecified.
    pub fn reachable_map(
        &self,
        timeout: &Timeout,
    ) -> Result<FxHashMap<V, FxHashSet<V>>, ErrorKind> {
        let n = self.verts.len();
        // Post-order over a DAG: children finish before parents.
        let mut state = vec![0u8; n]; // 0 = unvisited, 1 = open, 2 = done
        let mut order: Vec<usize> = Vec::with_capacity(n);
        let mut work: Vec<(usize, usize)> = Vec::new();
        for root in 0..n {
            if state[root] != 0 {
                continue;
            }
            state[root] = 1;
            work.push((root, 0));
            loop {
                timeout.check("graph.reachable_map")?;
                let (v, pos) = match work.last_mut() {
                    Some(frame) => {
                        let out = *frame;
                        frame.1 += 1;
                        out
                    }
                    None => break,
                };
                if pos < self.adj[v].len() {
                    let w = self.adj[v][pos].1;
                    if state[w] == 0 {
                        state[w] = 1;
                        work.push((w, 0));
                    }
                } else {
                    state[v] = 2;
                    order.push(v);
                    work.pop();
                }
            }
        }

        let mut sets: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); n];
        for &v in &order {
            let mut set = FxHashSet::default();
            set.insert(v);
            for (_, t) in &self.adj[v] {
                for d in &sets[*t] {
                    set.insert(*d);
                }
            }
            sets[v] = set;
        }

        let mut out = FxHashMap::default();
        for (v, set) in sets.into_iter().enumerate() {
            out.insert(
                self.verts[v].clone(),
                set.into_iter().map(|i| self.verts[i].clone()).collect(),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_timeout() -> Timeout {
        Timeout::NoTimeout
    }

    #[test]
    fn test_scc_cycle() {
        let g = Graph::from_edges(vec![(0, 'a', 1), (1, 'b', 2), (2, 'c', 0), (2, 'd', 3)]);
        let mut sccs = g.scc(&no_timeout()).unwrap();
        for c in &mut sccs {
            c.sort_unstable();
        }
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_scc_singleton_without_self_loop() {
        let g = Graph::from_edges(vec![(0, 'a', 1)]);
        let sccs = g.scc(&no_timeout()).unwrap();
        assert_eq!(sccs.len(), 2);
        assert!(sccs.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_scc_self_loop() {
        let g = Graph::from_edges(vec![(0, 'a', 0)]);
        let sccs = g.scc(&no_timeout()).unwrap();
        assert_eq!(sccs, vec![vec![0]]);
    }

    #[test]
    fn test_path_shortest() {
        let g = Graph::from_edges(vec![
            (0, 'a', 1),
            (1, 'b', 2),
            (0, 'x', 2),
            (2, 'c', 3),
        ]);
        let p = g.path(&[0], &3, &no_timeout()).unwrap().unwrap();
        assert_eq!(p, vec!['x', 'c']);
    }

    #[test]
    fn test_path_source_is_target() {
        let g = Graph::from_edges(vec![(0, 'a', 1)]);
        let p = g.path(&[1], &1, &no_timeout()).unwrap().unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_path_unreachable() {
        let g = Graph::from_edges(vec![(0, 'a', 1), (2, 'b', 3)]);
        assert!(g.path(&[0], &3, &no_timeout()).unwrap().is_none());
    }

    #[test]
    fn test_reverse() {
        let g = Graph::from_edges(vec![(0, 'a', 1), (1, 'b', 2)]);
        let r = g.reverse();
        assert!(r.path(&[2], &0, &no_timeout()).unwrap().is_some());
        assert!(r.path(&[0], &2, &no_timeout()).unwrap().is_none());
    }

    #[test]
    fn test_reachable() {
        let g = Graph::from_edges(vec![(0, 'a', 1), (1, 'b', 0), (2, 'c', 3)]);
        let r = g.reachable(&[0], &no_timeout()).unwrap();
        assert!(r.contains(&0));
        assert!(r.contains(&1));
        assert!(!r.contains(&2));
        assert!(!r.contains(&3));
    }

    #[test]
    fn test_reachable_map_on_dag() {
        let g = Graph::from_edges(vec![(0, (), 1), (0, (), 2), (1, (), 3), (2, (), 3)]);
        let m = g.reachable_map(&no_timeout()).unwrap();
        let zero: FxHashSet<i32> = [0, 1, 2, 3].into_iter().collect();
        assert_eq!(m[&0], zero);
        let three: FxHashSet<i32> = [3].into_iter().collect();
        assert_eq!(m[&3], three);
    }

    #[test]
    fn test_duplicate_edges_kept() {
        let g = Graph::from_edges(vec![(0, 'a', 1), (0, 'a', 1)]);
        assert_eq!(g.edges().len(), 2);
    }
}
