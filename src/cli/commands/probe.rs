use super::ReportFormat;
use crate::cli::Output;
use crate::config::ChunkpipeConfig;
use crate::split::{ShellHost, SplitterChain};
use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::Path;

#[derive(Args)]
pub struct ProbeArgs {
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

pub async fn execute(args: ProbeArgs, custom_config: Option<&Path>, output: &Output) -> Result<()> {
    let settings = ChunkpipeConfig::load(custom_config, None::<()>)?.settings()?;
    let host = ShellHost::probe();
    let chain = SplitterChain::detect(settings.splitter.external);

    match args.format {
        ReportFormat::Json => {
            let host = host.as_ref().map(|h| match h {
                ShellHost::Native { bash } => json!({"kind": "native", "shell": bash}),
                ShellHost::Wsl { wsl } => json!({"kind": "wsl", "shell": wsl}),
            });
            let report = json!({
                "external_enabled": settings.splitter.external,
                "shell_host": host,
                "strategies": chain.strategy_names(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReportFormat::Text => {
            match &host {
                Some(host) => output.success(&format!("External split tools available via {host}")),
                None => output.warning("No external split tools found (need bash, grep, wc and split, or WSL)"),
            }
            if !settings.splitter.external {
                output.info("External splitting is disabled by configuration");
            }
            output.info(&format!(
                "Strategies in order: {}",
                chain.strategy_names().join(" → ")
            ));
        }
    }

    Ok(())
}
