//! Intermediate representation: typed values and arena-backed program trees

pub mod node;
pub mod types;

// Re-export commonly used types
pub use node::{Forest, Head, Node, NodeId, PrimId, Program};
pub use types::{Grid, GridKey, Type, Value};
