//! The map phase
//!
//! One job per chunk index. Each job reads its chunk file (or the aligned pair of
//! chunk files for a pairwise transform), applies the transform record by record
//! and writes one result file. Jobs share nothing but the read-only transform,
//! so they run on the bounded executor from [`crate::parallel`] without locks.
//!
//! Result files are written to a temporary file in the result directory and
//! persisted under their final name only once the whole chunk is consumed, so
//! a half-written result is never visible to the combiner.

pub mod record;
pub mod transform;

pub use record::parse_record;
pub use transform::{Arity, BUILTINS, BuiltinTransform, Transform};

use crate::error::{PipelineError, Result};
use crate::parallel::{ChunkProgress, ExecutionStrategy};
use crate::plan::{READ_BUFFER_SIZE, is_blank};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Chunk file(s) a job reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSource {
    Single(PathBuf),
    Pair(PathBuf, PathBuf),
}

/// One unit of work: a chunk index, its input(s) and its result file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    pub index: usize,
    pub source: ChunkSource,
    pub output: PathBuf,
}

/// What one worker did with its chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkReport {
    pub index: usize,
    /// Records (or aligned record pairs) read from the chunk
    pub records_read: u64,
    pub records_written: u64,
    /// Records that failed to parse or were filtered out by the transform
    pub records_skipped: u64,
}

pub struct WorkerPool {
    max_workers: usize,
    show_progress: bool,
}

impl WorkerPool {
    /// Pool for `chunk_count` chunks: the host's worker ceiling (see
    /// [`ExecutionStrategy::calculate_optimal_workers`]) capped by the chunk count.
    pub fn new(chunk_count: usize, pool_size: usize, thread_percentage: u8) -> Self {
        let ceiling = ExecutionStrategy::calculate_optimal_workers(pool_size, thread_percentage);
        Self::with_workers(ceiling.min(chunk_count))
    }

    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every job and wait for all of them.
    ///
    /// Returns one report per job, sorted by chunk index. If any worker fails the
    /// first failure is returned; there is no retry.
    pub fn run(&self, jobs: Vec<ChunkJob>, transform: &Transform) -> Result<Vec<ChunkReport>> {
        let total = jobs.len();
        let strategy = ExecutionStrategy::for_workers(self.max_workers.min(total));
        let started = Instant::now();

        tracing::info!(
            "Mapping {} chunks with '{}' on {} worker(s)",
            total,
            transform.name(),
            strategy.workers()
        );

        let progress = if self.show_progress {
            ChunkProgress::new(total, strategy.workers())
        } else {
            ChunkProgress::hidden(total)
        };
        let stats = progress.stats();
        let reporter = |current: usize, total: usize, _worker_id: usize| progress.update(current, total);

        let outcome = strategy.execute(
            jobs,
            |job, worker_id| {
                tracing::debug!("Worker {} processing chunk {}", worker_id, job.index);
                let report = process_chunk(job, transform);
                if let Ok(report) = &report {
                    stats.add(report.records_written, report.records_skipped);
                }
                report
            },
            Some(reporter),
        );

        let completed = progress.position();
        progress.finish();
        let (written, skipped) = stats.counts();
        tracing::info!(
            "{}/{} chunks completed: {} records written, {} skipped",
            completed,
            total,
            written,
            skipped
        );

        let mut reports = outcome
            .map_err(|e| PipelineError::Pool(format!("{e:#}")))?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        reports.sort_by_key(|r| r.index);

        tracing::info!(
            "Map phase finished: {} chunks in {:.2}s",
            reports.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(reports)
    }
}

/// Process one job: transform its chunk(s) into its result file
pub fn process_chunk(job: &ChunkJob, transform: &Transform) -> Result<ChunkReport> {
    let result_dir = job
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(result_dir).map_err(worker_error(job.index, &job.output))?;

    let report = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let report = match &job.source {
            ChunkSource::Single(input) => map_unary(job, input, transform, &mut writer)?,
            ChunkSource::Pair(a, b) => map_pairwise(job, a, b, transform, &mut writer)?,
        };
        writer.flush().map_err(worker_error(job.index, &job.output))?;
        report
    };

    temp.persist(&job.output)
        .map_err(|e| worker_error(job.index, &job.output)(e.error))?;

    tracing::debug!(
        "Chunk {}: {} read, {} written, {} skipped",
        report.index,
        report.records_read,
        report.records_written,
        report.records_skipped
    );
    Ok(report)
}

fn map_unary<W: Write>(
    job: &ChunkJob,
    input: &Path,
    transform: &Transform,
    writer: &mut W,
) -> Result<ChunkReport> {
    let mut records = RecordLines::open(input).map_err(worker_error(job.index, input))?;
    let mut report = ChunkReport::empty(job.index);

    while let Some(line) = records.next_line().map_err(worker_error(job.index, input))? {
        report.records_read += 1;
        match parse_record(line).and_then(|x| transform.apply_unary(x)) {
            Some(value) => {
                writeln!(writer, "{value}").map_err(worker_error(job.index, &job.output))?;
                report.records_written += 1;
            }
            None => report.records_skipped += 1,
        }
    }

    Ok(report)
}

/// Reads both chunks in lock-step and stops at the end of the shorter one
fn map_pairwise<W: Write>(
    job: &ChunkJob,
    a: &Path,
    b: &Path,
    transform: &Transform,
    writer: &mut W,
) -> Result<ChunkReport> {
    let mut left = RecordLines::open(a).map_err(worker_error(job.index, a))?;
    let mut right = RecordLines::open(b).map_err(worker_error(job.index, b))?;
    let mut report = ChunkReport::empty(job.index);

    loop {
        let Some(x) = left.next_line().map_err(worker_error(job.index, a))?.map(parse_record) else {
            break;
        };
        let Some(y) = right.next_line().map_err(worker_error(job.index, b))?.map(parse_record) else {
            break;
        };
        report.records_read += 1;

        match x.zip(y).and_then(|(x, y)| transform.apply_pairwise(x, y)) {
            Some(value) => {
                writeln!(writer, "{value}").map_err(worker_error(job.index, &job.output))?;
                report.records_written += 1;
            }
            None => report.records_skipped += 1,
        }
    }

    Ok(report)
}

impl ChunkReport {
    fn empty(index: usize) -> Self {
        Self {
            index,
            records_read: 0,
            records_written: 0,
            records_skipped: 0,
        }
    }
}

fn worker_error(index: usize, path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Worker {
        index,
        path: path.to_path_buf(),
        source,
    }
}

/// Non-blank lines of a chunk file
struct RecordLines {
    reader: BufReader<File>,
    line: Vec<u8>,
}

impl RecordLines {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?),
            line: Vec::new(),
        })
    }

    fn next_line(&mut self) -> io::Result<Option<&[u8]>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            if !is_blank(&self.line) {
                return Ok(Some(&self.line));
            }
        }
    }
}
