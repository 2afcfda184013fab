use super::settings::Settings;
use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "CHUNKPIPE_";
const REPO_CONFIG_BASE: &str = "chunkpipe";

pub struct ChunkpipeConfig {
    figment: Figment,
}

impl ChunkpipeConfig {
    /// Merge every configuration layer, lowest priority first:
    /// embedded defaults, user config, repository config, `custom_config`,
    /// `CHUNKPIPE_` environment variables, then `cli_overrides`.
    pub fn load<T: Serialize>(custom_config: Option<&Path>, cli_overrides: Option<T>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(base) = Self::user_config_base_path() {
            figment = merge_any_format(figment, &base);
        }
        figment = merge_any_format(figment, REPO_CONFIG_BASE);

        if let Some(path) = custom_config {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            tracing::trace!("CONFIG LOAD: Custom config {}", path.display());
            figment = figment.merge(file_provider(path)?);
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(overrides));
        }

        Ok(Self { figment })
    }

    /// Get a nested value or section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        self.figment
            .extract_inner(path)
            .with_context(|| format!("Configuration key '{path}' not found"))
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }

    /// Typed, validated view of the merged configuration
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn user_config_base_path() -> Option<String> {
        std::env::var("HOME")
            .ok()
            .map(|home| format!("{home}/.config/chunkpipe/config"))
    }
}

/// Merge `<base>.toml`, `<base>.json`, `<base>.yaml` and `<base>.yml`; absent files are skipped
fn merge_any_format(figment: Figment, base: &str) -> Figment {
    figment
        .merge(Toml::file(format!("{base}.toml")))
        .merge(Json::file(format!("{base}.json")))
        .merge(Yaml::file(format!("{base}.yaml")))
        .merge(Yaml::file(format!("{base}.yml")))
}

/// Pick the provider for a config file from its extension
fn file_provider(path: &Path) -> Result<ConfigFile> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "toml" => Ok(ConfigFile::Toml(Toml::file(path))),
        "json" => Ok(ConfigFile::Json(Json::file(path))),
        "yaml" | "yml" => Ok(ConfigFile::Yaml(Yaml::file(path))),
        other => bail!(
            "Unsupported config format '{other}' for {} (use .toml, .json or .yaml)",
            path.display()
        ),
    }
}

enum ConfigFile {
    Toml(figment::providers::Data<Toml>),
    Json(figment::providers::Data<Json>),
    Yaml(figment::providers::Data<Yaml>),
}

impl figment::Provider for ConfigFile {
    fn metadata(&self) -> figment::Metadata {
        match self {
            Self::Toml(p) => p.metadata(),
            Self::Json(p) => p.metadata(),
            Self::Yaml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> std::result::Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error>
    {
        match self {
            Self::Toml(p) => p.data(),
            Self::Json(p) => p.data(),
            Self::Yaml(p) => p.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{ConfigOverrides, PipelineOverrides};
    use figment::Jail;
    use std::path::PathBuf;

    fn load(custom: Option<&str>, overrides: Option<ConfigOverrides>) -> figment::error::Result<Settings> {
        let config = ChunkpipeConfig::load(custom.map(Path::new), overrides).map_err(|e| e.to_string())?;
        config.settings().map_err(|e| format!("{e:#}").into())
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let settings = load(None, None)?;
            assert_eq!(settings.pipeline.chunk_count, 10);
            assert_eq!(settings.pipeline.pool_size, 0);
            assert_eq!(settings.pipeline.workspace_root, PathBuf::from(".chunkpipe"));
            assert!(settings.splitter.external);
            assert_eq!(settings.transform.unary, "double");
            assert_eq!(settings.transform.pairwise, "sum");
            Ok(())
        });
    }

    #[test]
    fn test_repo_config_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("chunkpipe.toml", "[pipeline]\nchunk_count = 4\n")?;
            let settings = load(None, None)?;
            assert_eq!(settings.pipeline.chunk_count, 4);
            assert!(settings.splitter.external);
            Ok(())
        });
    }

    #[test]
    fn test_custom_file_formats() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "splitter:\n  external: false\n")?;
            jail.create_file("custom.json", r#"{"transform": {"unary": "square"}}"#)?;

            assert!(!load(Some("custom.yaml"), None)?.splitter.external);
            assert_eq!(load(Some("custom.json"), None)?.transform.unary, "square");
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_file_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(ChunkpipeConfig::load(Some(Path::new("nope.toml")), None::<()>).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_files_and_cli_overrides_env() {
        Jail::expect_with(|jail| {
            jail.create_file("chunkpipe.toml", "[pipeline]\nchunk_count = 4\npool_size = 2\n")?;
            jail.set_env("CHUNKPIPE_PIPELINE__CHUNK_COUNT", "6");
            jail.set_env("CHUNKPIPE_PIPELINE__POOL_SIZE", "3");

            let settings = load(None, None)?;
            assert_eq!(settings.pipeline.chunk_count, 6);
            assert_eq!(settings.pipeline.pool_size, 3);

            let overrides = ConfigOverrides {
                pipeline: PipelineOverrides {
                    chunk_count: Some(8),
                    ..PipelineOverrides::default()
                },
                ..ConfigOverrides::default()
            };
            let settings = load(None, Some(overrides))?;
            assert_eq!(settings.pipeline.chunk_count, 8);
            // Flags that were not given leave lower layers alone
            assert_eq!(settings.pipeline.pool_size, 3);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("chunkpipe.toml", "[pipeline]\nchunk_count = 0\n")?;
            assert!(load(None, None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_get_section() {
        Jail::expect_with(|_jail| {
            let config = ChunkpipeConfig::load(None, None::<()>).map_err(|e| e.to_string())?;
            assert_eq!(
                config.get_section("pipeline.chunk_count").map_err(|e| e.to_string())?,
                serde_json::json!(10)
            );
            assert!(config.get_section("pipeline").map_err(|e| e.to_string())?.is_object());
            assert!(config.get_section("pipeline.nope").is_err());
            Ok(())
        });
    }
}
