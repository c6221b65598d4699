//! Parallel exploration of many targets.
//!
//! # Architecture
//!
//! - A **task queue** holds one `(target, window)` task per target and window,
//!   in window-major order
//! - A bounded pool of **workers** pulls tasks and enumerates one window each
//! - A **coordinator** collects matches and per-window statistics
//! - **Shared state** holds, per target, the lowest window solved so far.
//!   In fast mode a worker abandons its window as soon as a lower window has
//!   solved the same target.
//!
//! # Example
//!
//! ```ignore
//! use arcdream::search::parallel::{ParallelConfig, run_parallel_explore};
//!
//! let config = ParallelConfig::default()
//!     .with_workers(4)
//!     .with_timeout(Duration::from_secs(60));
//!
//! let result = run_parallel_explore(&library, &prior, &Type::MAT, &targets, &search_config, &config);
//! ```

pub mod channel;
pub mod config;
pub mod coordinator;

pub use config::ParallelConfig;
pub use coordinator::{run_parallel_explore, ParallelResult};
