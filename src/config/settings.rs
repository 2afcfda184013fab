//! Typed view of the merged configuration

use crate::pipeline::PipelineConfig;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub splitter: SplitterSettings,
    pub transform: TransformSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub chunk_count: usize,
    pub pool_size: usize,
    pub thread_percentage: u8,
    pub workspace_root: PathBuf,
    pub keep_workspace: bool,
    pub progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterSettings {
    /// Try the external line tools before the in-process splitter
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSettings {
    pub unary: String,
    pub pairwise: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_count == 0 {
            bail!("pipeline.chunk_count must be at least 1");
        }
        if !(1..=100).contains(&self.pipeline.thread_percentage) {
            bail!(
                "pipeline.thread_percentage must be between 1 and 100, got {}",
                self.pipeline.thread_percentage
            );
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_count: self.pipeline.chunk_count,
            pool_size: self.pipeline.pool_size,
            thread_percentage: self.pipeline.thread_percentage,
            workspace_root: self.pipeline.workspace_root.clone(),
            external_splitter: self.splitter.external,
            keep_workspace: self.pipeline.keep_workspace,
            progress: self.pipeline.progress,
        }
    }

    /// Configured transform name for one or two inputs
    pub fn transform_name(&self, pairwise: bool) -> &str {
        if pairwise {
            &self.transform.pairwise
        } else {
            &self.transform.unary
        }
    }
}

/// Command line overrides. Only flags that were actually given are serialized,
/// so absent flags never mask lower configuration layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub pipeline: PipelineOverrides,
    pub splitter: SplitterOverrides,
    pub transform: TransformOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_workspace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairwise: Option<String>,
}
