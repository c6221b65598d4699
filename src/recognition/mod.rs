//! Recognition boundary
//!
//! After every compression round the session hands a [`TrainingBatch`] to a
//! [`RecognitionModel`] and asks it for log-probabilities over the grown
//! library. The core never looks inside the model; it only re-indexes the
//! returned map with [`Prior::from_log_probs`], which treats any missing
//! primitive as unusable.

use crate::ir::{Forest, Grid, Head, NodeId, PrimId, Program};
use crate::library::{Library, LibrarySnapshot, Prior, PriorError};
use std::collections::{BTreeMap, HashMap};

/// A solved tree and the grid it reproduces
#[derive(Debug, Clone)]
pub struct TrainingPair {
    pub program: Program,
    pub target: Grid,
}

/// Everything a recognition model sees after a round
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub library: Library,
    pub pairs: Vec<TrainingPair>,
}

impl TrainingBatch {
    pub fn new(library: Library, pairs: Vec<TrainingPair>) -> Self {
        Self { library, pairs }
    }

    /// Serializable view of the library, for models living outside the process
    pub fn snapshot(&self) -> LibrarySnapshot {
        LibrarySnapshot::capture(&self.library)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// An external model that re-weights the library between rounds
pub trait RecognitionModel {
    fn name(&self) -> &str;

    fn train(&mut self, batch: &TrainingBatch);

    /// Log-probability of each primitive of `library`. Primitives left out
    /// are unusable in the next round.
    fn predict(&self, library: &Library) -> HashMap<PrimId, f64>;
}

/// Ask `model` for a prior over `library` and validate it
pub fn next_prior<M: RecognitionModel + ?Sized>(
    model: &M,
    library: &Library,
) -> Result<Prior, PriorError> {
    let log_probs = model.predict(library);
    let prior = Prior::from_log_probs(library, &log_probs)?;
    let missing = prior.missing(library);
    if !missing.is_empty() {
        log::warn!(
            "{} left {} primitives without probability",
            model.name(),
            missing.len()
        );
    }
    Ok(prior)
}

/// Usage counts of each primitive in the tree at `root`.
///
/// Literal leaves are attributed to the library entry holding their value.
/// Calls to discovered primitives count once; their expansion does not.
pub fn usage_counts(library: &Library, forest: &Forest, root: NodeId) -> BTreeMap<PrimId, usize> {
    let mut counts = BTreeMap::new();
    for id in forest.preorder(root) {
        let node = forest.get(id);
        let prim = match &node.head {
            Head::Call(prim) => Some(*prim),
            Head::Literal(value) => library.literal(&node.ty, value).map(|def| def.id),
            Head::Hole(_) => None,
        };
        if let Some(prim) = prim {
            *counts.entry(prim).or_insert(0) += 1;
        }
    }
    counts
}

/// Re-estimates each primitive's probability from how often the solved
/// programs use it, smoothed with pseudocounts.
///
/// Within a type, `p(prim) = (uses(prim) + pseudocounts) / (uses(type) +
/// pseudocounts * |type|)`. With no training data this is the uniform prior.
#[derive(Debug, Clone)]
pub struct FrequencyModel {
    pseudocounts: f64,
    counts: BTreeMap<PrimId, f64>,
}

const DEFAULT_PSEUDOCOUNTS: f64 = 1.0;

impl Default for FrequencyModel {
    fn default() -> Self {
        Self::new(DEFAULT_PSEUDOCOUNTS)
    }
}

impl FrequencyModel {
    /// Pseudocounts that are not a positive finite number fall back to 1.
    pub fn new(pseudocounts: f64) -> Self {
        let pseudocounts = if pseudocounts > 0.0 && pseudocounts.is_finite() {
            pseudocounts
        } else {
            log::warn!(
                "pseudocounts must be positive, using {} instead of {}",
                DEFAULT_PSEUDOCOUNTS,
                pseudocounts
            );
            DEFAULT_PSEUDOCOUNTS
        };
        Self {
            pseudocounts,
            counts: BTreeMap::new(),
        }
    }

    pub fn pseudocounts(&self) -> f64 {
        self.pseudocounts
    }

    pub fn count(&self, id: PrimId) -> f64 {
        self.counts.get(&id).copied().unwrap_or(0.0)
    }
}

impl RecognitionModel for FrequencyModel {
    fn name(&self) -> &str {
        "frequency"
    }

    fn train(&mut self, batch: &TrainingBatch) {
        self.counts.clear();
        for pair in &batch.pairs {
            let program = &pair.program;
            for (id, n) in usage_counts(&batch.library, program.forest(), program.root()) {
                *self.counts.entry(id).or_insert(0.0) += n as f64;
            }
        }
        log::debug!(
            "frequency model trained on {} programs, {} primitives used",
            batch.len(),
            self.counts.len()
        );
    }

    fn predict(&self, library: &Library) -> HashMap<PrimId, f64> {
        let mut log_probs = HashMap::with_capacity(library.len());
        for ty in library.types() {
            let ids = library.of_type(ty);
            let total: f64 = ids
                .iter()
                .map(|&id| self.count(id) + self.pseudocounts)
                .sum();
            for &id in ids {
                let lp = (self.count(id) + self.pseudocounts).ln() - total.ln();
                log_probs.insert(id, lp.min(0.0));
            }
        }
        log_probs
    }
}
