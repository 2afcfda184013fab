//! Materializing a partition as chunk files
//!
//! Splitting is done by one of several strategies behind the [`Splitter`] trait.
//! A [`SplitterChain`] tries them in priority order:
//!
//! 1. [`ExternalToolSplitter`] shells out to `grep`/`wc`/`split` when the
//!    capability probe finds a shell exposing them (natively or through WSL).
//! 2. [`StreamingSplitter`] runs in-process and is always available.
//!
//! A failure of a recoverable strategy is logged and the next strategy is tried
//! for that input only. Only the failure of the last strategy reaches the caller.
//!
//! ```text
//! input ──count──▶ plan ──split──▶ chunk_0.txt, chunk_1.txt, ...
//!         (strategy)        (strategy)
//! ```

pub mod external;
pub mod streaming;

pub use external::{ExternalToolSplitter, ShellHost};
pub use streaming::StreamingSplitter;

use crate::error::{PipelineError, Result};
use crate::plan::{self, Partition};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A materialized chunk of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFile {
    pub index: usize,
    pub path: PathBuf,
    pub line_count: u64,
}

/// A way of counting and splitting an input into chunk files
pub trait Splitter: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Count the non-blank lines of `input`
    fn count_records(&self, input: &Path) -> Result<u64>;

    /// Write one `chunk_<index>.txt` per partition entry into `output_dir`
    fn split(&self, input: &Path, output_dir: &Path, partition: &Partition)
    -> Result<Vec<ChunkFile>>;
}

/// Chunks produced for one input, and the strategy that produced them
#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub partition: Partition,
    pub chunks: Vec<ChunkFile>,
    pub strategy: &'static str,
}

/// Splitting strategies in priority order, with fallback on recoverable failure
pub struct SplitterChain {
    strategies: Vec<Box<dyn Splitter>>,
}

impl SplitterChain {
    pub fn new(strategies: Vec<Box<dyn Splitter>>) -> Self {
        Self { strategies }
    }

    /// Build the chain from what the host actually provides.
    ///
    /// The external strategy is only included when enabled and when the probe
    /// finds a usable shell; the streaming strategy always closes the chain.
    pub fn detect(external_enabled: bool) -> Self {
        let mut strategies: Vec<Box<dyn Splitter>> = Vec::new();

        if external_enabled {
            match ShellHost::probe() {
                Some(host) => {
                    tracing::debug!("External split tools available via {}", host);
                    strategies.push(Box::new(ExternalToolSplitter::new(host)));
                }
                None => tracing::debug!("No external split tools found, using streaming splitter"),
            }
        }

        strategies.push(Box::new(StreamingSplitter));
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Count the records of `input` and plan its partition, without writing chunks
    pub fn plan_input(&self, input: &Path, chunk_count: usize) -> Result<(Partition, &'static str)> {
        ensure_readable(input)?;

        self.with_fallback(input, |splitter| {
            let total = splitter.count_records(input)?;
            Ok((plan::plan(total, chunk_count)?, splitter.name()))
        })
    }

    /// Count, plan and split `input` into `output_dir`
    pub fn split_input(
        &self,
        input: &Path,
        output_dir: &Path,
        chunk_count: usize,
    ) -> Result<SplitOutcome> {
        ensure_readable(input)?;

        self.with_fallback(input, |splitter| {
            let started = Instant::now();
            let total = splitter.count_records(input)?;
            let partition = plan::plan(total, chunk_count)?;
            let chunks = splitter.split(input, output_dir, &partition)?;

            tracing::info!(
                "Split {} into {} chunks of up to {} records with the {} splitter ({:.2}s)",
                input.display(),
                chunks.len(),
                partition.lines_per_chunk(),
                splitter.name(),
                started.elapsed().as_secs_f64()
            );

            Ok(SplitOutcome {
                partition,
                chunks,
                strategy: splitter.name(),
            })
        })
    }

    fn with_fallback<T, F>(&self, input: &Path, attempt: F) -> Result<T>
    where
        F: Fn(&dyn Splitter) -> Result<T>,
    {
        let mut strategies = self.strategies.iter().peekable();

        while let Some(splitter) = strategies.next() {
            match attempt(&**splitter) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_recoverable() && strategies.peek().is_some() => {
                    tracing::warn!("{}; falling back to the next splitter", e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(PipelineError::Split {
            path: input.to_path_buf(),
            source: std::io::Error::other("no splitting strategy configured"),
        })
    }
}

/// Inputs that cannot be read fail planning before any strategy runs
fn ensure_readable(input: &Path) -> Result<()> {
    let metadata = fs::metadata(input).map_err(|source| PipelineError::Planning {
        path: input.to_path_buf(),
        source,
    })?;

    if metadata.is_dir() {
        return Err(PipelineError::Planning {
            path: input.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "input is a directory"),
        });
    }
    Ok(())
}
