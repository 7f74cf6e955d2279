//! Symbolic witnesses and the complexity lattice.

use std::fmt;

/// A pump-form family of inputs: for repetition `n` the word is
/// `prefix₁ pump₁ⁿ prefix₂ pump₂ⁿ … suffix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness<A> {
    pub pumps: Vec<(Vec<A>, Vec<A>)>,
    pub suffix: Vec<A>,
}

impl<A: Clone> Witness<A> {
    /// Total pump length per repetition step.
    pub fn pump_total(&self) -> usize {
        self.pumps.iter().map(|(_, pump)| pump.len()).sum()
    }

    /// Length contributed by the prefixes and suffix alone.
    pub fn fixed_len(&self) -> usize {
        self.pumps.iter().map(|(prefix, _)| prefix.len()).sum::<usize>() + self.suffix.len()
    }

    /// Expanded length for repetition `n`.
    pub fn attack_len(&self, n: usize) -> usize {
        self.fixed_len() + self.pump_total() * n
    }

    /// The largest `n` whose expansion stays within `cap` characters;
    /// at least 1.
    pub fn max_n_for(&self, cap: usize) -> usize {
        let pump = self.pump_total().max(1);
        let budget = cap.saturating_sub(self.fixed_len());
        (budget / pump).max(1)
    }

    /// Expands the witness at repetition `n`.
    pub fn build_attack(&self, n: usize) -> Vec<A> {
        let mut out = Vec::with_capacity(self.attack_len(n));
        for (prefix, pump) in &self.pumps {
            out.extend(prefix.iter().cloned());
            for _ in 0..n {
                out.extend(pump.iter().cloned());
            }
        }
        out.extend(self.suffix.iter().cloned());
        out
    }
}

/// Worst-case matching-time complexity of a pattern under backtracking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Complexity {
    Constant,
    Linear,
    Polynomial {
        degree: usize,
        witness: Witness<char>,
    },
    Exponential {
        witness: Witness<char>,
    },
}

impl Complexity {
    pub fn is_vulnerable(&self) -> bool {
        matches!(
            self,
            Complexity::Polynomial { .. } | Complexity::Exponential { .. }
        )
    }

    pub fn witness(&self) -> Option<&Witness<char>> {
        match self {
            Complexity::Polynomial { witness, .. } | Complexity::Exponential { witness } => {
                Some(witness)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Constant => write!(f, "constant"),
            Complexity::Linear => write!(f, "linear"),
            Complexity::Polynomial { degree, .. } => {
                write!(f, "{}th degree polynomial", degree)
            }
            Complexity::Exponential { .. } => write!(f, "exponential"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn witness() -> Witness<char> {
        Witness {
            pumps: vec![(vec!['x'], vec!['a', 'b'])],
            suffix: vec!['z'],
        }
    }

    #[test]
    fn test_build_attack() {
        let w = witness();
        assert_eq!(w.build_attack(0), vec!['x', 'z']);
        assert_eq!(w.build_attack(2), vec!['x', 'a', 'b', 'a', 'b', 'z']);
        assert_eq!(w.attack_len(2), 6);
    }

    #[test]
    fn test_max_n_for() {
        let w = witness();
        // fixed = 2, pump = 2: n = (10 - 2) / 2 = 4.
        assert_eq!(w.max_n_for(10), 4);
        assert_eq!(w.max_n_for(0), 1);
    }

    #[test]
    fn test_multi_pump_expansion() {
        let w = Witness {
            pumps: vec![(vec![], vec!['a']), (vec!['b'], vec!['c'])],
            suffix: vec![],
        };
        assert_eq!(w.build_attack(2), vec!['a', 'a', 'b', 'c', 'c']);
        assert_eq!(w.pump_total(), 2);
    }
}
