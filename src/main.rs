use chunkpipe::cli::{Cli, Output};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new(false, quiet).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
