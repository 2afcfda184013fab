//! Workspace directories for chunk and result files
//!
//! All scratch files of a run live under one root: a split directory per input
//! and one result directory. The pipeline resets the workspace before a run, so
//! leftovers from a crashed run never leak into the next one, and again after a
//! successful run, so only the final output remains.

use crate::error::{PipelineError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SPLIT_DIR_A: &str = "splits_a";
const SPLIT_DIR_B: &str = "splits_b";
const RESULT_DIR: &str = "results";

/// Which input a split directory belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSide {
    A,
    B,
}

/// File name of the chunk with the given index
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{index}.txt")
}

/// File name of the result for the chunk with the given index
pub fn result_file_name(index: usize) -> String {
    format!("out_chunk_{index}.txt")
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn split_dir(&self, side: InputSide) -> PathBuf {
        match side {
            InputSide::A => self.root.join(SPLIT_DIR_A),
            InputSide::B => self.root.join(SPLIT_DIR_B),
        }
    }

    pub fn result_dir(&self) -> PathBuf {
        self.root.join(RESULT_DIR)
    }

    pub fn chunk_path(&self, side: InputSide, index: usize) -> PathBuf {
        self.split_dir(side).join(chunk_file_name(index))
    }

    pub fn result_path(&self, index: usize) -> PathBuf {
        self.result_dir().join(result_file_name(index))
    }

    /// Remove the split and result directories. Absent directories are fine.
    ///
    /// The root itself is removed only when nothing else is left in it, since it
    /// may be a directory the user shares with other files.
    pub fn reset(&self) -> Result<()> {
        for dir in [
            self.split_dir(InputSide::A),
            self.split_dir(InputSide::B),
            self.result_dir(),
        ] {
            match fs::remove_dir_all(&dir) {
                Ok(()) => tracing::debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(PipelineError::workspace(dir, e)),
            }
        }

        // Fails harmlessly when the root is absent or still holds other files
        if fs::remove_dir(&self.root).is_ok() {
            tracing::debug!("Removed empty workspace root {}", self.root.display());
        }

        Ok(())
    }

    /// Create the directories a run writes into
    pub fn prepare(&self, pairwise: bool) -> Result<()> {
        let mut dirs = vec![self.split_dir(InputSide::A), self.result_dir()];
        if pairwise {
            dirs.push(self.split_dir(InputSide::B));
        }

        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| PipelineError::workspace(&dir, e))?;
        }
        Ok(())
    }
}
