use super::ReportFormat;
use crate::cli::Output;
use crate::config::{ChunkpipeConfig, ConfigOverrides, PipelineOverrides, SplitterOverrides};
use crate::plan::Partition;
use crate::split::SplitterChain;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct PlanArgs {
    /// Input file to count and partition
    pub input: PathBuf,

    /// Number of chunks
    #[arg(long, value_name = "N")]
    pub chunks: Option<usize>,

    /// Count with the in-process scanner only
    #[arg(long)]
    pub no_external: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    input: &'a Path,
    strategy: &'static str,
    partition: &'a Partition,
}

pub async fn execute(args: PlanArgs, custom_config: Option<&Path>, output: &Output) -> Result<()> {
    let overrides = ConfigOverrides {
        pipeline: PipelineOverrides {
            chunk_count: args.chunks,
            ..PipelineOverrides::default()
        },
        splitter: SplitterOverrides {
            external: args.no_external.then_some(false),
        },
        ..ConfigOverrides::default()
    };
    let settings = ChunkpipeConfig::load(custom_config, Some(overrides))?.settings()?;

    let chain = SplitterChain::detect(settings.splitter.external);
    let input = args.input.clone();
    let chunk_count = settings.pipeline.chunk_count;

    let (partition, strategy) = tokio::task::spawn_blocking(move || chain.plan_input(&input, chunk_count))
        .await
        .context("Planning task did not complete")?
        .with_context(|| format!("Cannot plan {}", args.input.display()))?;

    match args.format {
        ReportFormat::Json => {
            let report = PlanReport {
                input: &args.input,
                strategy,
                partition: &partition,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReportFormat::Text => {
            output.info(&format!(
                "{}: {} records, {} chunk(s) of up to {} (counted by the {} splitter)",
                args.input.display(),
                partition.total_records(),
                partition.len(),
                partition.lines_per_chunk(),
                strategy
            ));
            output.header("Chunks");
            for chunk in partition.iter() {
                output.field(
                    &format!("chunk_{}", chunk.index),
                    format!(
                        "records {}..{} ({} lines)",
                        chunk.start_line,
                        chunk.end_line(),
                        chunk.line_count
                    ),
                );
            }
        }
    }

    Ok(())
}
