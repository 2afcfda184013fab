use super::ReportFormat;
use crate::cli::Output;
use crate::config::{
    ChunkpipeConfig, ConfigOverrides, PipelineOverrides, SplitterOverrides, TransformOverrides,
};
use crate::pipeline::{Pipeline, RunReport};
use crate::worker::Transform;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RunArgs {
    /// Input file (the first input of a pairwise transform)
    pub input: PathBuf,

    /// Second input, aligned record by record with the first
    #[arg(long, value_name = "INPUT_B")]
    pub pair: Option<PathBuf>,

    /// Final output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of chunks per input
    #[arg(long, value_name = "N")]
    pub chunks: Option<usize>,

    /// Maximum number of worker threads
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory for split and result files
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Built-in transform to apply (see `chunkpipe transforms`)
    #[arg(short, long)]
    pub transform: Option<String>,

    /// Never use the external split tools
    #[arg(long)]
    pub no_external: bool,

    /// Keep chunk and result files after a successful run
    #[arg(long)]
    pub keep_workspace: bool,

    /// Show a progress bar while chunks are transformed
    #[arg(long)]
    pub progress: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

impl RunArgs {
    /// Only flags that were given become overrides
    fn overrides(&self) -> ConfigOverrides {
        let (unary, pairwise) = match (&self.pair, &self.transform) {
            (Some(_), Some(name)) => (None, Some(name.clone())),
            (None, Some(name)) => (Some(name.clone()), None),
            (_, None) => (None, None),
        };

        ConfigOverrides {
            pipeline: PipelineOverrides {
                chunk_count: self.chunks,
                pool_size: self.workers,
                workspace_root: self.workspace.clone(),
                keep_workspace: self.keep_workspace.then_some(true),
                progress: self.progress.then_some(true),
            },
            splitter: SplitterOverrides {
                external: self.no_external.then_some(false),
            },
            transform: TransformOverrides { unary, pairwise },
        }
    }
}

pub async fn execute(args: RunArgs, custom_config: Option<&Path>, output: &Output) -> Result<()> {
    let config = ChunkpipeConfig::load(custom_config, Some(args.overrides()))?;
    let settings = config.settings()?;

    let pairwise = args.pair.is_some();
    let transform = Transform::builtin(settings.transform_name(pairwise))?;
    let pipeline_config = settings.pipeline_config();

    if args.format == ReportFormat::Text {
        output.step(&format!(
            "Running '{}' over {} chunk(s) per input",
            transform.name(),
            pipeline_config.chunk_count
        ));
    }

    let pipeline = Pipeline::new(pipeline_config, transform);
    output.verbose(&format!(
        "Splitting strategies: {}",
        pipeline.splitters().strategy_names().join(" → ")
    ));

    let RunArgs {
        input,
        pair,
        output: final_output,
        format,
        ..
    } = args;

    let report = tokio::task::spawn_blocking(move || {
        pipeline
            .run(&input, pair.as_deref(), &final_output)
            .with_context(|| format!("Pipeline failed for {}", input.display()))
    })
    .await
    .context("Pipeline task did not complete")??;

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_report(&report, output),
    }
    Ok(())
}

fn print_report(report: &RunReport, output: &Output) {
    for input in &report.inputs {
        output.info(&format!(
            "{}: {} records in {} chunk(s) of up to {} ({} splitter)",
            input.path.display(),
            input.total_records,
            input.chunks,
            input.lines_per_chunk,
            input.strategy
        ));
    }

    if report.records_skipped() > 0 {
        output.warning(&format!(
            "{} record(s) skipped (not an integer, or filtered by '{}')",
            report.records_skipped(),
            report.transform
        ));
    }

    output.success(&format!(
        "Wrote {} records to {} in {:.2}s with {} worker(s)",
        report.records_written(),
        report.combine.output.display(),
        report.timings.total_secs,
        report.workers
    ));

    output.header("Timings");
    output.field("split", format!("{:.3}s", report.timings.split_secs));
    output.field("map", format!("{:.3}s", report.timings.map_secs));
    output.field("combine", format!("{:.3}s", report.timings.combine_secs));
}
