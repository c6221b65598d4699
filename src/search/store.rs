//! Best known program per target

use crate::ir::{Grid, GridKey, Program};
use std::collections::BTreeMap;

/// A target together with the shortest program found for it
#[derive(Debug, Clone)]
pub struct StoredSolution {
    pub target: Grid,
    pub program: Program,
}

impl StoredSolution {
    pub fn size(&self) -> usize {
        self.program.size()
    }
}

/// Maps each target's canonical key to the fewest-node program found so far.
///
/// Iteration follows key order, so anything driven from the store (compression
/// in particular) sees the solutions in a reproducible order.
#[derive(Debug, Clone, Default)]
pub struct SolutionStore {
    entries: BTreeMap<GridKey, StoredSolution>,
}

impl SolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match for `target`. Replaces an existing entry only when the
    /// new program has strictly fewer nodes; returns whether it was stored.
    pub fn record(&mut self, target: &Grid, program: Program) -> bool {
        let key = target.key();
        match self.entries.get(&key) {
            Some(existing) if existing.size() <= program.size() => false,
            _ => {
                log::debug!(
                    "storing {}-node program for {:?} target",
                    program.size(),
                    target.dims()
                );
                self.entries.insert(
                    key,
                    StoredSolution {
                        target: target.clone(),
                        program,
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, target: &Grid) -> Option<&StoredSolution> {
        self.entries.get(&target.key())
    }

    pub fn contains(&self, target: &Grid) -> bool {
        self.entries.contains_key(&target.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredSolution> {
        self.entries.values()
    }

    /// Programs in key order
    pub fn programs(&self) -> Vec<Program> {
        self.entries.values().map(|s| s.program.clone()).collect()
    }

    /// Total node count across every stored program
    pub fn total_size(&self) -> usize {
        self.entries.values().map(StoredSolution::size).sum()
    }

    /// Swap in rewritten programs, one per entry in key order.
    ///
    /// Used at round boundaries after compression; the rewritten programs
    /// evaluate to the same targets, so the size rule of [`record`](Self::record)
    /// does not apply. Nodes the rewrite left unreachable are dropped.
    pub fn replace_programs(&mut self, programs: Vec<Program>) {
        debug_assert_eq!(programs.len(), self.entries.len());
        for (entry, mut program) in self.entries.values_mut().zip(programs) {
            program.compact();
            entry.program = program;
        }
    }
}
