//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events → logging.rs (subscriber with the PipelineLayer)
//!     → metrics.rs (counters for transitions, failures, drops)
//!
//! Consumers:
//!     → The assembled pipeline (console, Seq, GELF)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
