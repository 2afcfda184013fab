//! # chunkpipe
//!
//! Partition-map-combine over huge line-oriented files of integers.
//!
//! An input is counted and cut into line-aligned chunks (by the host's `split`
//! tool when available, otherwise by a streaming splitter), each chunk is
//! transformed record by record on a bounded worker pool, and the per-chunk
//! results are concatenated back in chunk order. Pairwise transforms read two
//! inputs that were split the same way and combine their records line by line.
//!
//! ## Library use
//!
//! ```no_run
//! use chunkpipe::{Pipeline, PipelineConfig, Transform};
//! use std::path::Path;
//!
//! let config = PipelineConfig {
//!     chunk_count: 8,
//!     ..PipelineConfig::default()
//! };
//! let pipeline = Pipeline::new(config, Transform::unary("triple", |x| x * 3));
//! let report = pipeline.run(Path::new("numbers.txt"), None, Path::new("tripled.txt"))?;
//! println!("{} records written", report.records_written());
//! # Ok::<(), chunkpipe::PipelineError>(())
//! ```

pub mod cli;
pub mod combine;
pub mod config;
pub mod error;
pub mod parallel;
pub mod pipeline;
pub mod plan;
pub mod split;
pub mod worker;
pub mod workspace;

pub use cli::{Cli, Output};
pub use config::ChunkpipeConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use plan::{ChunkRange, Partition};
pub use split::{Splitter, SplitterChain};
pub use worker::{Arity, Transform};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
