//! Benchmarks for record counting, splitting and a full streaming pipeline run

use chunkpipe::plan;
use chunkpipe::split::{Splitter, SplitterChain, StreamingSplitter};
use chunkpipe::{Pipeline, PipelineConfig, Transform};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::fs;
use std::hint::black_box;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_input(dir: &Path, records: u64) -> PathBuf {
    let path = dir.join(format!("input_{records}.txt"));
    let body: String = (0..records)
        .map(|n| if n % 97 == 0 { "\n".to_string() } else { format!("{n}\n") })
        .collect();
    fs::write(&path, body).unwrap();
    path
}

fn bench_count_records(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("count_records");

    for records in [10_000u64, 200_000] {
        let input = write_input(dir.path(), records);
        group.throughput(Throughput::Elements(records));
        group.bench_with_input(BenchmarkId::from_parameter(records), &input, |b, input| {
            b.iter(|| plan::count_records(black_box(input)).unwrap())
        });
    }
    group.finish();
}

fn bench_streaming_split(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), 200_000);
    let total = plan::count_records(&input).unwrap();
    let mut group = c.benchmark_group("streaming_split");

    for chunk_count in [4usize, 32] {
        let partition = plan::plan(total, chunk_count).unwrap();
        let out = dir.path().join(format!("chunks_{chunk_count}"));
        group.bench_with_input(BenchmarkId::from_parameter(chunk_count), &partition, |b, partition| {
            b.iter(|| StreamingSplitter.split(&input, &out, black_box(partition)).unwrap())
        });
    }
    group.finish();
}

fn bench_pipeline_run(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), 100_000);
    let output = dir.path().join("out.txt");
    let mut group = c.benchmark_group("pipeline_run");
    group.sample_size(10);

    for name in ["double", "heavy"] {
        let config = PipelineConfig {
            chunk_count: 16,
            workspace_root: dir.path().join("ws"),
            external_splitter: false,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::with_splitters(
            config,
            Transform::builtin(name).unwrap(),
            SplitterChain::new(vec![Box::new(StreamingSplitter)]),
        );
        group.bench_function(name, |b| b.iter(|| pipeline.run(&input, None, &output).unwrap()));
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_count_records,
    bench_streaming_split,
    bench_pipeline_run
);
criterion_main!(benches);
