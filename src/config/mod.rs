//! Layered configuration
//!
//! Built on `figment`: embedded defaults, user and repository config files,
//! a custom file, `CHUNKPIPE_<SECTION>__<KEY>` environment variables and
//! command line flags, merged in that order.

pub mod core;
pub mod formats;
pub mod settings;

pub use self::core::ChunkpipeConfig;
pub use formats::ConfigFormat;
pub use settings::{
    ConfigOverrides, PipelineOverrides, PipelineSettings, Settings, SplitterOverrides, SplitterSettings,
    TransformOverrides, TransformSettings,
};
