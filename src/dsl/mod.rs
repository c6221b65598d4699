//! Caller-side primitive sets
//!
//! The engine never defines primitive semantics itself; these sets are what
//! the binary and the tests hand to [`Library::new`](crate::library::Library::new).

pub mod grid;

pub use grid::{grid_primitives, scenario_primitives};
