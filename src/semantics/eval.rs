//! Evaluation of program trees to concrete values

use crate::ir::{Forest, Grid, Head, NodeId, PrimId, Program, Value};
use crate::library::{Library, PrimKind};
use thiserror::Error;

/// Evaluation failures. `Shape` and `Domain` are the expected, per-candidate
/// failures of the primitive functions; the rest indicate a malformed tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("shape error: {0}")]
    Shape(String),

    #[error("domain error: {0}")]
    Domain(String),

    #[error("expected {expected} arguments, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("hole ${0} has no bound argument")]
    UnboundHole(usize),

    #[error("primitive {0} is not in the library")]
    UnknownPrimitive(PrimId),

    #[error("type error: {0}")]
    Type(String),
}

impl EvalError {
    /// Shape and domain errors are normal outcomes for a search candidate
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EvalError::Shape(_) | EvalError::Domain(_))
    }
}

/// Evaluate a complete program
pub fn evaluate(library: &Library, program: &Program) -> Result<Value, EvalError> {
    evaluate_node(library, program.forest(), program.root())
}

/// Evaluate the subtree at `root`
pub fn evaluate_node(library: &Library, forest: &Forest, root: NodeId) -> Result<Value, EvalError> {
    eval_in(library, forest, root, &[])
}

fn eval_in(
    library: &Library,
    forest: &Forest,
    id: NodeId,
    env: &[Value],
) -> Result<Value, EvalError> {
    let node = forest.get(id);
    match &node.head {
        Head::Literal(value) => Ok(value.clone()),
        Head::Hole(index) => env.get(*index).cloned().ok_or(EvalError::UnboundHole(*index)),
        Head::Call(prim) => {
            let def = library.get(*prim).ok_or(EvalError::UnknownPrimitive(*prim))?;
            if node.tails.len() != def.arity() {
                return Err(EvalError::Arity {
                    expected: def.arity(),
                    found: node.tails.len(),
                });
            }
            let args = node
                .tails
                .iter()
                .map(|&t| eval_in(library, forest, t, env))
                .collect::<Result<Vec<_>, _>>()?;

            match &def.kind {
                PrimKind::Original(f) => f(&args),
                PrimKind::Literal(value) => Ok(value.clone()),
                PrimKind::Discovered(body) => match node.hiddentail {
                    Some(hidden) => eval_in(library, forest, hidden, &args),
                    None => eval_in(library, body.forest(), body.root(), &args),
                },
            }
        }
    }
}

/// Whether `value` is exactly the target grid
pub fn matches_target(value: &Value, target: &Grid) -> bool {
    value.as_grid() == Some(target)
}

/// A node is terminal iff it has no argument slots, or every slot is filled
/// by a terminal node. Unfilled holes are not terminal.
pub fn is_terminal(forest: &Forest, id: NodeId) -> bool {
    let node = forest.get(id);
    if node.is_hole() {
        return false;
    }
    node.tailtypes.is_empty()
        || (node.tails.len() == node.tailtypes.len()
            && node.tails.iter().all(|&t| is_terminal(forest, t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::grid;
    use crate::ir::Type;

    fn lib() -> Library {
        Library::new(grid::grid_primitives()).unwrap()
    }

    #[test]
    fn test_evaluate_scenario_program() {
        let lib = lib();
        let program = lib.parse("rep_t(fill(0, 3, 3), 2)").unwrap();
        let value = evaluate(&lib, &program).unwrap();
        assert!(matches_target(&value, &Grid::filled(2, 3, 3, 0)));
        assert!(!matches_target(&value, &Grid::filled(1, 3, 3, 0)));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let lib = lib();
        let program = lib.parse("cat_h(fill(1, 2, 2), fill(2, 2, 1))").unwrap();
        assert_eq!(evaluate(&lib, &program), evaluate(&lib, &program));
    }

    #[test]
    fn test_shape_error_is_recoverable() {
        let lib = lib();
        // heights 2 and 3 cannot be joined side by side
        let program = lib.parse("cat_h(fill(1, 2, 2), fill(1, 3, 2))").unwrap();
        let err = evaluate(&lib, &program).unwrap_err();
        assert!(matches!(err, EvalError::Shape(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_domain_error_is_recoverable() {
        let lib = lib();
        let program = lib.parse("fill(0, 0, 3)").unwrap();
        let err = evaluate(&lib, &program).unwrap_err();
        assert!(matches!(err, EvalError::Domain(_)));
        assert!(err.is_recoverable());
        assert!(!EvalError::UnboundHole(0).is_recoverable());
    }

    #[test]
    fn test_discovered_call_expands_body() {
        let lib = lib();
        let body = lib.parse("fill($0, 3, 3)").unwrap();
        let (lib, _) = lib.register_discovered(body, vec![Type::INT]).unwrap();

        let program = lib.parse("rep_t(g0(2), 2)").unwrap();
        let value = evaluate(&lib, &program).unwrap();
        assert!(matches_target(&value, &Grid::filled(2, 3, 3, 2)));
    }

    #[test]
    fn test_unbound_hole() {
        let lib = lib();
        let body = lib.parse("fill($0, 3, 3)").unwrap();
        assert_eq!(evaluate(&lib, &body), Err(EvalError::UnboundHole(0)));
    }

    #[test]
    fn test_is_terminal() {
        let lib = lib();
        let program = lib.parse("rep_t(fill(0, 3, 3), 2)").unwrap();
        assert!(is_terminal(program.forest(), program.root()));

        let body = lib.parse("rep_t(fill($0, 3, 3), 2)").unwrap();
        assert!(!is_terminal(body.forest(), body.root()));
    }
}
