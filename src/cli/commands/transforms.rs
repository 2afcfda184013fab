use super::ReportFormat;
use crate::cli::Output;
use crate::config::ChunkpipeConfig;
use crate::worker::BUILTINS;
use anyhow::Result;
use clap::Args;
use console::style;
use std::path::Path;

#[derive(Args)]
pub struct TransformsArgs {
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

pub async fn execute(args: TransformsArgs, custom_config: Option<&Path>, output: &Output) -> Result<()> {
    if args.format == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(BUILTINS)?);
        return Ok(());
    }

    let settings = ChunkpipeConfig::load(custom_config, None::<()>)?.settings()?;

    output.header("Built-in transforms");
    for builtin in BUILTINS {
        let is_default =
            builtin.name == settings.transform.unary || builtin.name == settings.transform.pairwise;
        let mut line = format!("{:<9} {}", builtin.arity, builtin.description);
        if builtin.positive_only {
            line.push_str(" (positive records only)");
        }
        if is_default {
            line.push_str(&format!(" {}", style("[default]").green()));
        }
        output.field(builtin.name, line);
    }

    Ok(())
}
