//! Semantics of program trees: evaluation and the terminal predicate

pub mod eval;

// Re-export main functionality
pub use eval::{evaluate, evaluate_node, is_terminal, matches_target, EvalError};
