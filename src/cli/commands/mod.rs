use crate::cli::Output;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod config;
pub mod plan;
pub mod probe;
pub mod run;
pub mod transforms;
pub mod version;

#[derive(Parser)]
#[command(
    name = "chunkpipe",
    version = env!("CARGO_PKG_VERSION"),
    about = "Split huge line-oriented numeric files, transform the chunks in parallel, and stitch the results back in order",
    long_about = "chunkpipe partitions one or two large files of integers into line-aligned chunks, \
                  applies a per-record transform to every chunk on a bounded worker pool, and \
                  combines the per-chunk results into one output in the original record order."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split, transform and combine one input (or two, for pairwise transforms)
    Run(run::RunArgs),
    /// Count records and show how an input would be partitioned
    Plan(plan::PlanArgs),
    /// Report which splitting strategies this host supports
    Probe(probe::ProbeArgs),
    /// List the built-in transforms
    Transforms(transforms::TransformsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Output format for command reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Cannot change directory to {}", dir.display()))?;
        }

        setup_logging(self.verbose, self.quiet);

        let output = Output::new(self.verbose > 0, self.quiet);
        let custom_config = self.config.as_deref();

        match self.command {
            Some(Commands::Run(args)) => run::execute(args, custom_config, &output).await,
            Some(Commands::Plan(args)) => plan::execute(args, custom_config, &output).await,
            Some(Commands::Probe(args)) => probe::execute(args, custom_config, &output).await,
            Some(Commands::Transforms(args)) => {
                transforms::execute(args, custom_config, &output).await
            }
            Some(Commands::Config(args)) => config::execute(args, custom_config, &output).await,
            Some(Commands::Version(args)) => version::execute(args).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pairwise_run() {
        let cli = Cli::try_parse_from([
            "chunkpipe", "-vv", "run", "a.txt", "--pair", "b.txt", "-o", "out.txt", "--chunks", "4",
            "--no-external",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.pair, Some(PathBuf::from("b.txt")));
                assert_eq!(args.chunks, Some(4));
                assert!(args.no_external);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_requires_output() {
        assert!(Cli::try_parse_from(["chunkpipe", "run", "a.txt"]).is_err());
    }
}
