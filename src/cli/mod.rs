//! Command-line interface for chunkpipe

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
