//! Enrichment and routing pipeline.
//!
//! # Data Flow
//! ```text
//! tracing event
//!     → layer.rs (map to LogRecord, gate on LevelSwitch, collect span fields)
//!     → Pipeline::emit
//!         → enrich.rs (application name → log context → correlation id → exception)
//!         → every sink (console always; Seq / GELF when configured)
//! ```
//!
//! # Design Decisions
//! - Composition is decided once by assembler.rs and never changes
//! - Only the level moves at runtime, through the shared LevelSwitch
//! - Records below the active level are dropped before any enrichment

pub mod assembler;
pub mod context;
pub mod correlation;
pub mod enrich;
pub mod layer;
pub mod record;

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::level::{LevelSwitch, Severity};
use crate::pipeline::enrich::Enricher;
use crate::sinks::{Sink, SinkKind, SINK_DIAGNOSTICS_TARGET};

pub use assembler::{assemble, plan, AssembleError, SinkPlan, SinkSpec};
pub use context::LogContext;
pub use correlation::CorrelationId;
pub use layer::PipelineLayer;
pub use record::{ExceptionDetail, LogRecord};

/// The assembled enrichment + routing chain.
pub struct Pipeline {
    application_name: String,
    switch: Arc<LevelSwitch>,
    enrichers: Vec<Box<dyn Enricher>>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("application_name", &self.application_name)
            .field("enrichers", &self.enrichers.len())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(crate) fn new(
        application_name: String,
        switch: Arc<LevelSwitch>,
        enrichers: Vec<Box<dyn Enricher>>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Self {
        Self {
            application_name,
            switch,
            enrichers,
            sinks,
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn level_switch(&self) -> &Arc<LevelSwitch> {
        &self.switch
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    pub fn sink_kinds(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|s| s.kind()).collect()
    }

    #[inline]
    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.switch.is_enabled(severity)
    }

    /// Gate, enrich, and route one record.
    pub fn emit(&self, mut record: LogRecord) {
        if !self.switch.is_enabled(record.severity) {
            return;
        }
        for enricher in &self.enrichers {
            enricher.enrich(&mut record);
        }

        // Sink failure reports stay local so a broken remote sink cannot loop.
        let diagnostics = record.target.starts_with(SINK_DIAGNOSTICS_TARGET);
        for sink in &self.sinks {
            if diagnostics && sink.kind() != SinkKind::Console {
                continue;
            }
            sink.write(&record);
        }
    }

    /// Flush and stop every sink, giving up after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        let deadline = time::Instant::now() + timeout;
        for sink in &self.sinks {
            if time::timeout_at(deadline, sink.shutdown()).await.is_err() {
                tracing::warn!(
                    target: SINK_DIAGNOSTICS_TARGET,
                    sink = ?sink.kind(),
                    "Sink did not flush before the shutdown deadline, dropping the rest"
                );
            }
        }
    }
}
