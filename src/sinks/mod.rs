//! Sink subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline::emit (level-gated, enriched record)
//!     → console.rs (formatted line, written inline)
//!     → seq.rs   ─┐
//!     → gelf.rs  ─┴→ queue.rs (bounded channel) → background worker → network
//! ```
//!
//! # Design Decisions
//! - `write` never blocks on the network; remote sinks only enqueue
//! - A full queue drops the record and counts it
//! - `shutdown` closes the queue and resolves once the worker has drained it;
//!   a worker still running at the shutdown deadline is aborted
//! - Sink failures are logged under [`SINK_DIAGNOSTICS_TARGET`], which the
//!   pipeline routes to the console only

pub mod backoff;
pub mod console;
pub mod gelf;
pub mod queue;
pub mod seq;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::pipeline::record::LogRecord;

pub use console::ConsoleSink;
pub use gelf::{GelfSink, Transport};
pub use seq::SeqSink;

/// Target used for the sinks' own failure reports.
pub const SINK_DIAGNOSTICS_TARGET: &str = "dynamic_logging::sinks";

/// Resolves when a sink has flushed and released its resources.
pub type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Which destination a sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    RemoteAggregator,
    StructuredServer,
    /// Host-provided sink.
    Custom,
}

/// A destination for log records.
pub trait Sink: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// Accept one record. Must not block on I/O beyond a local write.
    fn write(&self, record: &LogRecord);

    /// Flush and stop. Writes after shutdown are dropped.
    fn shutdown(&self) -> ShutdownFuture;
}

/// Errors raised while building or driving a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected batch with status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("message needs {chunks} chunks, limit is {limit}")]
    TooManyChunks { chunks: usize, limit: usize },
}
