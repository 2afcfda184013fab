//! Parallel execution for the map phase
//!
//! This module only manages threads and system resources. It knows nothing about
//! chunks or transforms; the worker pool in [`crate::worker`] decides how many
//! workers a run gets and what each one does.
//!
//! ```text
//! ┌──────────────┐  chunk indices  ┌────────────────────┐
//! │  WorkerPool  │────────────────▶│ ExecutionStrategy  │──▶ scoped threads
//! │ (worker.rs)  │◀────────────────│ Sequential/Parallel│    (crossbeam)
//! └──────────────┘   ChunkReports  └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use chunkpipe::parallel::ExecutionStrategy;
//!
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
//! let strategy = ExecutionStrategy::for_workers(workers.min(4));
//!
//! let mut doubled = strategy
//!     .execute(vec![1, 2, 3], |x, _worker_id| x * 2, None::<fn(usize, usize, usize)>)
//!     .unwrap();
//! doubled.sort();
//! assert_eq!(doubled, vec![2, 4, 6]);
//! ```

pub mod executor;
pub mod progress;

pub use executor::{ExecutionStrategy, ParallelExecutor, SequentialExecutor};
pub use progress::{ChunkProgress, RecordStats};
