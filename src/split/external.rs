//! Splitting with the host's line tools
//!
//! Counting and splitting are delegated to `grep`, `wc` and `split` run through
//! bash. Blank lines are filtered with `grep -a -v` in both steps, so boundaries
//! match the streaming splitter exactly. Hosts without the tools on `PATH` but
//! with WSL get the same scripts run through `wsl -e bash -c`.

use super::{ChunkFile, Splitter};
use crate::error::{PipelineError, Result};
use crate::plan::Partition;
use crate::workspace::chunk_file_name;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const STRATEGY: &str = "external";

/// Tools the native shell must expose
const REQUIRED_TOOLS: &[&str] = &["grep", "wc", "split"];

/// Prints the non-blank lines of a file. `-a` keeps grep from treating input
/// with NUL bytes as binary and suppressing its lines. `grep` exits 1 when
/// nothing matched, which is a valid (empty) result here.
const NON_BLANK_LINES: &str = "{ LC_ALL=C grep -a -v '^[[:space:]]*$' {input} || test $? -eq 1; }";

/// Prefix for the raw files `split` writes into the staging directory
const RAW_PREFIX: &str = "part_";

/// Where the external tools run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellHost {
    /// bash plus the tools directly on `PATH`
    Native { bash: PathBuf },
    /// Tools reached through the WSL compatibility layer
    Wsl { wsl: PathBuf },
}

impl ShellHost {
    /// Look for a shell that can run the split scripts.
    ///
    /// Only verified tool availability decides; the platform name never does.
    pub fn probe() -> Option<Self> {
        if let Ok(bash) = which::which("bash")
            && REQUIRED_TOOLS.iter().all(|tool| which::which(tool).is_ok())
        {
            return Some(Self::Native { bash });
        }

        which::which("wsl").ok().map(|wsl| Self::Wsl { wsl })
    }

    fn command(&self, script: &str) -> Command {
        match self {
            Self::Native { bash } => {
                let mut cmd = Command::new(bash);
                cmd.arg("-c").arg(script);
                cmd
            }
            Self::Wsl { wsl } => {
                let mut cmd = Command::new(wsl);
                cmd.args(["-e", "bash", "-c"]).arg(script);
                cmd
            }
        }
    }

    /// Shell word for a host path, translated for WSL when needed
    fn path_arg(&self, path: &Path, suffix: &str) -> String {
        let quoted = shell_words::quote(&path.to_string_lossy()).into_owned();
        match self {
            Self::Native { .. } if suffix.is_empty() => quoted,
            Self::Native { .. } => shell_words::quote(&format!("{}{}", path.to_string_lossy(), suffix))
                .into_owned(),
            Self::Wsl { .. } => format!("\"$(wslpath -u {quoted}){suffix}\""),
        }
    }
}

impl fmt::Display for ShellHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { bash } => write!(f, "native shell ({})", bash.display()),
            Self::Wsl { wsl } => write!(f, "WSL ({})", wsl.display()),
        }
    }
}

pub struct ExternalToolSplitter {
    host: ShellHost,
}

impl ExternalToolSplitter {
    pub fn new(host: ShellHost) -> Self {
        Self { host }
    }

    /// Run a script, returning its stdout or a recoverable strategy failure
    fn run_script(&self, input: &Path, script: &str) -> Result<String> {
        tracing::trace!("Running external split script: {}", script);

        let output = self
            .host
            .command(&format!("set -o pipefail; {script}"))
            .output()
            .map_err(|e| PipelineError::strategy(STRATEGY, input, format!("failed to launch shell: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::strategy(
                STRATEGY,
                input,
                format!("script exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn non_blank_lines(&self, input: &Path) -> String {
        NON_BLANK_LINES.replace("{input}", &self.host.path_arg(input, ""))
    }

    /// Move the raw `split` output into place as `chunk_<index>.txt`.
    ///
    /// Index is assigned by lexical order of the raw names, which is the order
    /// `split` wrote them in. Already renamed chunks are removed again on error.
    fn rename_chunks(
        &self,
        input: &Path,
        staging: &Path,
        output_dir: &Path,
        partition: &Partition,
    ) -> Result<Vec<ChunkFile>> {
        let strategy_error = |reason: String| PipelineError::strategy(STRATEGY, input, reason);

        let mut raw_files: Vec<PathBuf> = fs::read_dir(staging)
            .map_err(|e| strategy_error(format!("cannot list split output: {e}")))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        raw_files.sort();

        if raw_files.len() != partition.len() {
            return Err(strategy_error(format!(
                "split produced {} files, expected {}",
                raw_files.len(),
                partition.len()
            )));
        }

        let mut chunks: Vec<ChunkFile> = Vec::with_capacity(raw_files.len());
        for (range, raw) in partition.iter().zip(raw_files) {
            let path = output_dir.join(chunk_file_name(range.index));
            if let Err(e) = fs::rename(&raw, &path) {
                for chunk in &chunks {
                    if let Err(cleanup) = fs::remove_file(&chunk.path) {
                        tracing::debug!(
                            "Could not remove partial chunk {}: {}",
                            chunk.path.display(),
                            cleanup
                        );
                    }
                }
                return Err(strategy_error(format!(
                    "cannot rename {} to {}: {e}",
                    raw.display(),
                    path.display()
                )));
            }
            chunks.push(ChunkFile {
                index: range.index,
                path,
                line_count: range.line_count,
            });
        }

        Ok(chunks)
    }
}

impl Splitter for ExternalToolSplitter {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn count_records(&self, input: &Path) -> Result<u64> {
        let stdout = self.run_script(input, &format!("{} | wc -l", self.non_blank_lines(input)))?;

        stdout.trim().parse::<u64>().map_err(|e| {
            PipelineError::strategy(
                STRATEGY,
                input,
                format!("unparseable line count {:?}: {e}", stdout.trim()),
            )
        })
    }

    fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        partition: &Partition,
    ) -> Result<Vec<ChunkFile>> {
        fs::create_dir_all(output_dir).map_err(|e| {
            PipelineError::strategy(STRATEGY, input, format!("cannot create {}: {e}", output_dir.display()))
        })?;

        if partition.is_empty() {
            return Ok(Vec::new());
        }

        // Private staging directory, so enumeration never picks up unrelated files
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(output_dir)
            .map_err(|e| PipelineError::strategy(STRATEGY, input, format!("cannot create staging dir: {e}")))?;

        let script = format!(
            "{} | split -a {} -l {} - {}",
            self.non_blank_lines(input),
            suffix_length(partition.len()),
            partition.lines_per_chunk(),
            self.host.path_arg(staging.path(), &format!("/{RAW_PREFIX}")),
        );
        self.run_script(input, &script)?;

        self.rename_chunks(input, staging.path(), output_dir, partition)
    }
}

/// Shortest `split -a` suffix length (minimum 2) that can name `files` outputs
fn suffix_length(files: usize) -> usize {
    let mut length = 2;
    let mut capacity = 26usize * 26;
    while capacity < files {
        length += 1;
        capacity = capacity.saturating_mul(26);
    }
    length
}
