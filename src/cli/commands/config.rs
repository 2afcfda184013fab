use crate::cli::Output;
use crate::config::{ChunkpipeConfig, ConfigFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display the merged configuration
    Show {
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
    /// Print one configuration value or section, e.g. `pipeline.chunk_count`
    Get { key: String },
    /// Check that the merged configuration is valid
    Validate,
}

pub async fn execute(args: ConfigArgs, custom_config: Option<&Path>, output: &Output) -> Result<()> {
    let config = ChunkpipeConfig::load(custom_config, None::<()>)?;

    match args.command {
        ConfigCommand::Show { format } => {
            println!("{}", config.export_config_highlighted(format)?.trim_end());
        }
        ConfigCommand::Get { key } => match config.get_section(&key)? {
            value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                println!("{}", serde_json::to_string_pretty(&value)?)
            }
            serde_json::Value::String(s) => println!("{s}"),
            value => println!("{value}"),
        },
        ConfigCommand::Validate => {
            config.settings()?;
            output.success("Configuration is valid");
        }
    }

    Ok(())
}
