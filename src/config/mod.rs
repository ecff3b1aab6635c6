//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! environment / snapshot file
//!     → source.rs (ConfigSource: one immutable ConfigSnapshot per read)
//!     → level reconciler (every tick) and pipeline assembler (once)
//!
//! options file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LoggingOptions (validated, immutable)
//!
//! On snapshot file change:
//!     watcher.rs detects change
//!     → nudges the reconciler for an immediate tick
//! ```
//!
//! # Design Decisions
//! - Snapshots are values; nothing holds on to one between ticks
//! - Blank optional fields are treated exactly like absent ones
//! - All option fields have defaults to allow minimal files

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

use std::path::PathBuf;
use thiserror::Error;

pub use schema::{
    ConfigSnapshot, ConsoleFormat, ConsoleOptions, DefaultNaming, GelfOptions, LoggingOptions,
    SeqOptions,
};
pub use source::{ConfigSource, EnvConfigSource, FileConfigSource};
pub use validation::ValidationError;

/// Error type for configuration reads.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Configuration unavailable: {0}")]
    Unavailable(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
