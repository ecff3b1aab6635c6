//! Subscriber installation.
//!
//! # Responsibilities
//! - Install the global tracing subscriber around a [`PipelineLayer`]
//! - Keep transport crates from logging into the sinks that use them
//!
//! `RUST_LOG`, when set, replaces the base filter. It is applied before the
//! level switch, so it can only hide records, never re-enable them.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::pipeline::PipelineLayer;

/// Lets everything through except transport internals.
pub const BASE_FILTER: &str = "trace,hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,rustls=warn,notify=warn";

/// Base filter, overridable through `RUST_LOG`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(BASE_FILTER))
}

/// Install `layer` as the process-wide subscriber.
pub fn install(layer: PipelineLayer) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(layer)
        .try_init()
}
