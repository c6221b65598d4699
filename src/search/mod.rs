//! Budgeted search for programs that reproduce a target grid
//!
//! This module provides:
//! - Windowed: anytime enumeration in increasing description-length windows
//! - Lazy: one depth-first pass under a fixed cost ceiling
//! - Parallel: a worker pool over `(target, window)` tasks
//!
//! Matches are collected in a [`SolutionStore`], which keeps the fewest-node
//! program per target.

pub mod config;
pub mod enumerate;
pub mod lazy;
pub mod parallel;
pub mod result;
pub mod store;

pub use config::{SearchConfig, SearchMode};
pub use enumerate::{explore, Enumerator, Explorer, Flow, Interrupt, Window, WindowEnd};
pub use lazy::{explore_below, Candidate, Candidates};
pub use parallel::{run_parallel_explore, ParallelConfig, ParallelResult};
pub use result::{ExploreResult, Outcome, SearchStatistics, Solution, Unsolved};
pub use store::{SolutionStore, StoredSolution};
