//! The combine phase
//!
//! Result files are appended to the final output strictly by ascending chunk
//! index. Every expected result file is checked before anything is written, and
//! the output goes through a temporary file in the destination directory that
//! is only persisted once every chunk has been copied.

use crate::error::{PipelineError, Result};
use crate::workspace::result_file_name;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombineSummary {
    pub chunks: usize,
    pub bytes_written: u64,
    pub output: PathBuf,
}

/// Concatenate `out_chunk_0.txt` .. `out_chunk_<chunk_count - 1>.txt` into `output`
pub fn combine(result_dir: &Path, chunk_count: usize, output: &Path) -> Result<CombineSummary> {
    let result_files: Vec<PathBuf> = (0..chunk_count)
        .map(|index| result_dir.join(result_file_name(index)))
        .collect();

    if let Some((index, path)) = result_files.iter().enumerate().find(|(_, p)| !p.is_file()) {
        return Err(PipelineError::CombineGap {
            index,
            path: path.clone(),
        });
    }

    let combine_error = |source: io::Error| PipelineError::Combine {
        path: output.to_path_buf(),
        source,
    };

    let output_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(output_dir).map_err(combine_error)?;

    let mut bytes_written = 0u64;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        for (index, path) in result_files.iter().enumerate() {
            let mut reader = File::open(path).map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => PipelineError::CombineGap {
                    index,
                    path: path.clone(),
                },
                _ => combine_error(source),
            })?;
            bytes_written += io::copy(&mut reader, &mut writer).map_err(combine_error)?;
            tracing::debug!("Appended result of chunk {}", index);
        }
        writer.flush().map_err(combine_error)?;
    }

    temp.persist(output).map_err(|e| combine_error(e.error))?;

    tracing::info!(
        "Combined {} chunks into {} ({} bytes)",
        chunk_count,
        output.display(),
        bytes_written
    );

    Ok(CombineSummary {
        chunks: chunk_count,
        bytes_written,
        output: output.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_results(dir: &Path, order: &[usize]) {
        for &index in order {
            fs::write(
                dir.join(result_file_name(index)),
                format!("{}\n{}\n", index * 10, index * 10 + 1),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_combines_by_index_not_completion_order() {
        let expected = "0\n1\n10\n11\n20\n21\n30\n31\n";

        for order in [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1]] {
            let temp_dir = TempDir::new().unwrap();
            write_results(temp_dir.path(), &order);

            let output = temp_dir.path().join("final.txt");
            let summary = combine(temp_dir.path(), 4, &output).unwrap();

            assert_eq!(fs::read_to_string(&output).unwrap(), expected);
            assert_eq!(summary.chunks, 4);
            assert_eq!(summary.bytes_written, expected.len() as u64);
        }
    }

    #[test]
    fn test_missing_result_is_gap_and_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write_results(temp_dir.path(), &[0, 2]);

        let output = temp_dir.path().join("final.txt");
        let err = combine(temp_dir.path(), 3, &output).unwrap_err();

        assert!(matches!(err, PipelineError::CombineGap { index: 1, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_zero_chunks_yields_empty_output() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("final.txt");

        let summary = combine(temp_dir.path(), 0, &output).unwrap();
        assert_eq!(summary.bytes_written, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[test]
    fn test_replaces_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        write_results(temp_dir.path(), &[0]);

        let output = temp_dir.path().join("final.txt");
        fs::write(&output, "stale\n").unwrap();

        combine(temp_dir.path(), 1, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "0\n1\n");
    }
}
