//! In-process streaming splitter
//!
//! Reads the input once to count records and once more to write the chunks.
//! Each chunk file is written through a buffered writer and closed as soon as
//! its line quota is met, so memory stays bounded by the read buffer.

use super::{ChunkFile, Splitter};
use crate::error::{PipelineError, Result};
use crate::plan::{self, Partition, READ_BUFFER_SIZE, is_blank};
use crate::workspace::chunk_file_name;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingSplitter;

impl Splitter for StreamingSplitter {
    fn name(&self) -> &'static str {
        "streaming"
    }

    fn count_records(&self, input: &Path) -> Result<u64> {
        plan::count_records(input)
    }

    fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        partition: &Partition,
    ) -> Result<Vec<ChunkFile>> {
        write_chunks(input, output_dir, partition).map_err(|source| PipelineError::Split {
            path: input.to_path_buf(),
            source,
        })
    }
}

fn write_chunks(input: &Path, output_dir: &Path, partition: &Partition) -> io::Result<Vec<ChunkFile>> {
    fs::create_dir_all(output_dir)?;

    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(input)?);
    let mut line = Vec::new();
    let mut chunks = Vec::with_capacity(partition.len());

    for range in partition.iter() {
        let path = output_dir.join(chunk_file_name(range.index));
        let mut writer = BufWriter::new(File::create(&path)?);
        let mut written = 0u64;

        while written < range.line_count {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "input ended after {} of {} records",
                        range.start_line + written,
                        partition.total_records()
                    ),
                ));
            }
            if is_blank(&line) {
                continue;
            }

            writer.write_all(&line)?;
            if !line.ends_with(b"\n") {
                writer.write_all(b"\n")?;
            }
            written += 1;
        }

        writer.flush()?;
        chunks.push(ChunkFile {
            index: range.index,
            path,
            line_count: written,
        });
    }

    Ok(chunks)
}
