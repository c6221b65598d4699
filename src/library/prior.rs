//! Probability prior over library primitives

use crate::ir::{Forest, Head, NodeId, PrimId, Type};
use crate::library::Library;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Slack allowed when checking that a type's probabilities sum to at most one
const MASS_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriorError {
    #[error("log-probability {value} for primitive {id} is positive")]
    Positive { id: PrimId, value: f64 },

    #[error("log-probability for primitive {0} is NaN")]
    NotANumber(PrimId),

    #[error("probabilities of type '{ty}' sum to {mass}, which exceeds 1")]
    MassExceeded { ty: Type, mass: f64 },
}

/// Log-probability of choosing each primitive among those of its type.
///
/// Primitives without an entry are unusable (log-probability negative infinity).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prior {
    log_probs: BTreeMap<PrimId, f64>,
}

impl Prior {
    /// Uniform distribution over the primitives of each type
    pub fn uniform(library: &Library) -> Self {
        let mut log_probs = BTreeMap::new();
        for ty in library.types() {
            let ids = library.of_type(ty);
            let lp = -(ids.len() as f64).ln();
            for &id in ids {
                log_probs.insert(id, lp);
            }
        }
        Self { log_probs }
    }

    /// Accept a prior produced outside the core (e.g. by a recognition model),
    /// re-indexed against `library`.
    ///
    /// Entries for ids outside the library are dropped; library primitives
    /// missing from `log_probs` become unusable.
    pub fn from_log_probs(
        library: &Library,
        log_probs: &HashMap<PrimId, f64>,
    ) -> Result<Self, PriorError> {
        let mut prior = BTreeMap::new();
        for def in library.iter() {
            match log_probs.get(&def.id) {
                Some(&value) if value.is_nan() => return Err(PriorError::NotANumber(def.id)),
                Some(&value) if value > 0.0 => {
                    return Err(PriorError::Positive { id: def.id, value });
                }
                Some(&value) => {
                    prior.insert(def.id, value);
                }
                None => {
                    log::warn!(
                        "prior has no entry for primitive '{}' ({}), treating it as unusable",
                        def.name,
                        def.id
                    );
                }
            }
        }

        for ty in library.types() {
            let mass: f64 = library
                .of_type(ty)
                .iter()
                .filter_map(|id| prior.get(id))
                .map(|lp| lp.exp())
                .sum();
            if mass > 1.0 + MASS_TOLERANCE {
                return Err(PriorError::MassExceeded {
                    ty: ty.clone(),
                    mass,
                });
            }
        }

        Ok(Self { log_probs: prior })
    }

    pub fn log_prob(&self, id: PrimId) -> f64 {
        self.log_probs.get(&id).copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Description length of choosing `id`: `-log_prob(id)`, never negative
    pub fn cost(&self, id: PrimId) -> f64 {
        -self.log_prob(id)
    }

    /// Library primitives that have no entry
    pub fn missing(&self, library: &Library) -> Vec<PrimId> {
        library
            .iter()
            .map(|def| def.id)
            .filter(|id| !self.log_probs.contains_key(id))
            .collect()
    }

    /// Total log-probability of the tree at `root`: the sum over every node.
    pub fn tree_log_prob(&self, library: &Library, forest: &Forest, root: NodeId) -> f64 {
        forest
            .preorder(root)
            .into_iter()
            .map(|id| {
                let node = forest.get(id);
                match &node.head {
                    Head::Call(prim) => self.log_prob(*prim),
                    Head::Literal(value) => library
                        .literal(&node.ty, value)
                        .map_or(f64::NEG_INFINITY, |def| self.log_prob(def.id)),
                    Head::Hole(_) => 0.0,
                }
            })
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimId, f64)> + '_ {
        self.log_probs.iter().map(|(&id, &lp)| (id, lp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::grid;

    fn lib() -> Library {
        Library::new(grid::scenario_primitives()).unwrap()
    }

    #[test]
    fn test_uniform() {
        let lib = lib();
        let prior = Prior::uniform(&lib);
        let fill = lib.find("fill").unwrap().id;
        let zero = lib.find("0").unwrap().id;
        assert!((prior.log_prob(fill) - (0.5f64).ln()).abs() < 1e-12);
        assert!((prior.log_prob(zero) - (0.25f64).ln()).abs() < 1e-12);
        assert!(prior.missing(&lib).is_empty());
    }

    #[test]
    fn test_missing_entry_is_unusable() {
        let lib = lib();
        let fill = lib.find("fill").unwrap().id;
        let map: HashMap<_, _> = Prior::uniform(&lib).iter().filter(|(id, _)| *id != fill).collect();

        let prior = Prior::from_log_probs(&lib, &map).unwrap();
        assert_eq!(prior.log_prob(fill), f64::NEG_INFINITY);
        assert_eq!(prior.cost(fill), f64::INFINITY);
        assert_eq!(prior.missing(&lib), vec![fill]);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let lib = lib();
        let fill = lib.find("fill").unwrap().id;

        let mut map: HashMap<_, _> = Prior::uniform(&lib).iter().collect();
        map.insert(fill, 0.5);
        assert!(matches!(
            Prior::from_log_probs(&lib, &map),
            Err(PriorError::Positive { .. })
        ));

        map.insert(fill, f64::NAN);
        assert_eq!(
            Prior::from_log_probs(&lib, &map),
            Err(PriorError::NotANumber(fill))
        );

        // both mat primitives at probability 0.9
        map.insert(fill, (0.9f64).ln());
        map.insert(lib.find("rep_t").unwrap().id, (0.9f64).ln());
        assert!(matches!(
            Prior::from_log_probs(&lib, &map),
            Err(PriorError::MassExceeded { .. })
        ));
    }

    #[test]
    fn test_tree_log_prob() {
        let lib = lib();
        let prior = Prior::uniform(&lib);
        let program = lib.parse("rep_t(fill(0, 3, 3), 2)").unwrap();
        let expected = 2.0 * (0.5f64).ln() + 4.0 * (0.25f64).ln();
        let lp = prior.tree_log_prob(&lib, program.forest(), program.root());
        assert!((lp - expected).abs() < 1e-12);
    }
}
