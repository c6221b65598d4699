//! Sampling programs from the prior ("dreaming")
//!
//! A [`Sampler`] draws well-typed trees top-down: at every slot it picks a
//! primitive of the slot's type with probability proportional to
//! `exp(log_prob)`. Runs are reproducible for a given seed.

use crate::ir::{Forest, Grid, GridKey, NodeId, Program, Type};
use crate::library::{Library, Prior};
use crate::semantics::evaluate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

/// Default maximum tree depth of a sample
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Attempts per requested dream before giving up
const ATTEMPTS_PER_DREAM: usize = 32;

/// A sampled program and the grid it evaluates to
#[derive(Debug, Clone)]
pub struct Dream {
    pub program: Program,
    pub target: Grid,
}

pub struct Sampler<'a> {
    library: &'a Library,
    prior: &'a Prior,
    max_depth: usize,
    rng: ChaCha8Rng,
}

impl<'a> Sampler<'a> {
    pub fn new(library: &'a Library, prior: &'a Prior, seed: u64) -> Self {
        Self {
            library,
            prior,
            max_depth: DEFAULT_MAX_DEPTH,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Draw one tree of type `ty`. Returns `None` when a slot has no usable
    /// primitive within the remaining depth.
    pub fn sample(&mut self, ty: &Type) -> Option<Program> {
        let mut forest = Forest::new();
        let root = self.sample_node(&mut forest, ty, 1)?;
        Some(Program::new(forest, root))
    }

    fn sample_node(&mut self, forest: &mut Forest, ty: &Type, depth: usize) -> Option<NodeId> {
        let at_limit = depth >= self.max_depth;
        let choices: Vec<_> = self
            .library
            .lookup(ty, self.prior)
            .into_iter()
            .filter(|(def, lp)| lp.is_finite() && !(at_limit && def.arity() > 0))
            .collect();
        let total: f64 = choices.iter().map(|(_, lp)| lp.exp()).sum();
        if choices.is_empty() || total <= 0.0 {
            return None;
        }

        let mut u = self.rng.random::<f64>() * total;
        let mut picked = choices[choices.len() - 1].0;
        for (def, lp) in &choices {
            let p = lp.exp();
            if u < p {
                picked = *def;
                break;
            }
            u -= p;
        }

        let mut tails = Vec::with_capacity(picked.arity());
        for arg in &picked.args {
            tails.push(self.sample_node(forest, arg, depth + 1)?);
        }
        Some(forest.add(picked.node(tails)))
    }

    /// Sample up to `count` programs of type `ty` whose grids are pairwise
    /// distinct. Samples that fail to evaluate are discarded.
    pub fn dream(&mut self, ty: &Type, count: usize) -> Vec<Dream> {
        let mut seen: BTreeSet<GridKey> = BTreeSet::new();
        let mut dreams = Vec::with_capacity(count);
        let mut attempts = 0;

        while dreams.len() < count && attempts < count * ATTEMPTS_PER_DREAM {
            attempts += 1;
            let Some(program) = self.sample(ty) else {
                continue;
            };
            let target = match evaluate(self.library, &program) {
                Ok(value) => match value.as_grid() {
                    Some(grid) => grid.clone(),
                    None => continue,
                },
                Err(e) => {
                    log::trace!("discarding dream: {}", e);
                    continue;
                }
            };
            if seen.insert(target.key()) {
                dreams.push(Dream { program, target });
            }
        }

        log::debug!("{} dreams in {} attempts", dreams.len(), attempts);
        dreams
    }
}
