//! Error types for the chunk pipeline
//!
//! Every fatal condition the pipeline can hit maps to one variant here. Record-level
//! parse failures are not errors: workers skip the record and count it instead.
//! Strategy failures of the external splitter are only ever seen by the splitter
//! chain, which logs them and falls back.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input's record count could not be determined
    #[error("cannot count records in {}: {source}", path.display())]
    Planning {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("chunk count must be at least 1")]
    InvalidChunkCount,

    /// A splitting strategy could not produce chunks; recoverable by falling back
    #[error("{strategy} splitter failed for {}: {reason}", path.display())]
    SplitStrategy {
        strategy: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The last available splitting strategy failed
    #[error("failed to split {}: {source}", path.display())]
    Split {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker for chunk {index} failed on {}: {source}", path.display())]
    Worker {
        index: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker pool failed: {0}")]
    Pool(String),

    #[error("result file for chunk {index} is missing: {}", path.display())]
    CombineGap { index: usize, path: PathBuf },

    #[error("failed to write combined output {}: {source}", path.display())]
    Combine {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("workspace operation failed on {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transform error: {0}")]
    Transform(String),
}

impl PipelineError {
    pub(crate) fn strategy(
        strategy: &'static str,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SplitStrategy {
            strategy,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Whether a splitter chain may recover from this error by trying the next strategy
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SplitStrategy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_strategy_failures_are_recoverable() {
        let err = PipelineError::strategy("external", "in.txt", "split exited with 1");
        assert!(err.is_recoverable());

        let err = PipelineError::CombineGap {
            index: 1,
            path: PathBuf::from("results/out_chunk_1.txt"),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_messages_name_the_path() {
        let err = PipelineError::Planning {
            path: PathBuf::from("missing.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let message = err.to_string();
        assert!(message.contains("missing.txt"));
        assert!(message.contains("no such file"));
    }
}
