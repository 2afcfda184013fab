//! Chunk planning
//!
//! Turns a record count into a deterministic partition of contiguous line ranges.
//! Only non-blank lines are records, so the count must come from a full pre-scan
//! (see [`count_records`]) or an equivalent external count before any boundary
//! is decided.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Read buffer for line scans (256 KB)
pub(crate) const READ_BUFFER_SIZE: usize = 256 * 1024;

/// One contiguous slice of an input's non-blank lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub index: usize,
    pub start_line: u64,
    pub line_count: u64,
}

impl ChunkRange {
    /// Exclusive end of the range
    pub fn end_line(&self) -> u64 {
        self.start_line + self.line_count
    }
}

/// Ordered, gapless set of chunk ranges covering an input exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    total_records: u64,
    lines_per_chunk: u64,
    chunks: Vec<ChunkRange>,
}

impl Partition {
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn lines_per_chunk(&self) -> u64 {
        self.lines_per_chunk
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRange> {
        self.chunks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ChunkRange> {
        self.chunks.get(index)
    }
}

/// Partition `total_lines` records into at most `chunk_count` contiguous chunks.
///
/// Every chunk holds `ceil(total_lines / chunk_count)` lines except the last,
/// which takes the remainder. Chunks that would be empty are never produced, so
/// small inputs yield fewer chunks than requested and an empty input yields none.
pub fn plan(total_lines: u64, chunk_count: usize) -> Result<Partition> {
    if chunk_count == 0 {
        return Err(PipelineError::InvalidChunkCount);
    }

    let lines_per_chunk = total_lines.div_ceil(chunk_count as u64);
    let mut chunks = Vec::with_capacity(chunk_count.min(total_lines as usize));

    for index in 0..chunk_count {
        let start_line = index as u64 * lines_per_chunk;
        if start_line >= total_lines {
            break;
        }
        let end_line = (start_line + lines_per_chunk).min(total_lines);
        chunks.push(ChunkRange {
            index,
            start_line,
            line_count: end_line - start_line,
        });
    }

    Ok(Partition {
        total_records: total_lines,
        lines_per_chunk,
        chunks,
    })
}

/// Whether a raw line holds nothing but POSIX `[[:space:]]` characters
pub fn is_blank(line: &[u8]) -> bool {
    line.iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
}

/// Count the non-blank lines of a file in one streaming pass
pub fn count_records(path: &Path) -> Result<u64> {
    let planning_error = |source: io::Error| PipelineError::Planning {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(planning_error)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut line = Vec::new();
    let mut records = 0u64;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).map_err(planning_error)?;
        if read == 0 {
            break;
        }
        if !is_blank(&line) {
            records += 1;
        }
    }

    tracing::debug!("Counted {} records in {}", records, path.display());
    Ok(records)
}
