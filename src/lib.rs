//! Runtime-adjustable logging control plane.
//!
//! A single process-wide [`LevelSwitch`] holds the active minimum level. A
//! background [`LevelReconciler`] re-reads configuration on a fixed period
//! and moves the switch when the configured level changes; the pipeline
//! assembled at startup consults it before doing any work for a record.

pub mod config;
pub mod level;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod sinks;

pub use config::{ConfigSnapshot, ConfigSource, EnvConfigSource, FileConfigSource, LoggingOptions};
pub use level::{parse_level, LevelReconciler, LevelSwitch, LevelTransition, Severity};
pub use lifecycle::{ControlPlane, LoggingHandle, Shutdown};
pub use pipeline::{assemble, LogContext, Pipeline, PipelineLayer};
pub use sinks::Sink;
