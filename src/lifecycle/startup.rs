//! Startup orchestration.
//!
//! [`ControlPlane::build`] reads the first snapshot, creates the level
//! switch and assembles the pipeline. The host then installs
//! [`ControlPlane::layer`] and calls [`ControlPlane::start`], which spawns
//! the reconciler and returns a [`LoggingHandle`] for shutdown.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::source::{ConfigSource, DEFAULT_LEVEL_NAME};
use crate::config::validation::validate_options;
use crate::config::{ConfigError, ConfigSnapshot, LoggingOptions};
use crate::level::reconciler::MIN_POLL_INTERVAL;
use crate::level::{parse_level, LevelReconciler, LevelSwitch, LevelTransition, Severity};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::pipeline::{assemble, AssembleError, Pipeline, PipelineLayer};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// A built but not yet running control plane.
pub struct ControlPlane {
    source: Arc<dyn ConfigSource>,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    nudges: Option<mpsc::UnboundedReceiver<()>>,
}

impl ControlPlane {
    /// Validate `options`, read the first snapshot and assemble the pipeline.
    ///
    /// An unreadable snapshot or unparsable level starts at
    /// [`Severity::Information`] with the console sink only.
    pub fn build(source: Arc<dyn ConfigSource>, options: LoggingOptions) -> Result<Self, StartError> {
        validate_options(&options).map_err(ConfigError::Validation)?;

        let snapshot = match source.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Initial configuration unavailable, using defaults");
                ConfigSnapshot::with_level(DEFAULT_LEVEL_NAME)
            }
        };

        let initial = parse_level(&snapshot.desired_level_name).unwrap_or_default();
        let switch = Arc::new(LevelSwitch::new(initial));
        metrics::record_level(initial);

        let pipeline = assemble(&snapshot, switch, &options)?;
        Ok(Self::with_pipeline(source, pipeline, &options))
    }

    /// Use a pipeline built elsewhere (custom sinks, tests).
    pub fn with_pipeline(
        source: Arc<dyn ConfigSource>,
        pipeline: Pipeline,
        options: &LoggingOptions,
    ) -> Self {
        Self {
            source,
            pipeline: Arc::new(pipeline),
            poll_interval: Duration::from_secs(options.poll_interval_secs).max(MIN_POLL_INTERVAL),
            shutdown_timeout: Duration::from_secs(options.shutdown_timeout_secs),
            nudges: None,
        }
    }

    /// Override the reconciliation period; never below [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Reconcile immediately whenever `nudges` yields.
    pub fn with_nudges(mut self, nudges: mpsc::UnboundedReceiver<()>) -> Self {
        self.nudges = Some(nudges);
        self
    }

    pub fn level_switch(&self) -> &Arc<LevelSwitch> {
        self.pipeline.level_switch()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Layer to install on the host's tracing subscriber.
    pub fn layer(&self) -> PipelineLayer {
        PipelineLayer::new(self.pipeline.clone())
    }

    /// Spawn the reconciler. Must be called inside a Tokio runtime.
    pub fn start(self) -> LoggingHandle {
        let shutdown = Shutdown::new();
        let switch = self.pipeline.level_switch().clone();

        let mut reconciler = LevelReconciler::new(self.source, switch.clone(), self.poll_interval);
        if let Some(nudges) = self.nudges {
            reconciler = reconciler.with_nudges(nudges);
        }
        let transitions = reconciler.subscribe();
        let task = tokio::spawn(reconciler.run(shutdown.subscribe()));

        LoggingHandle {
            switch,
            pipeline: self.pipeline,
            shutdown,
            reconciler: task,
            transitions,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// A running control plane.
pub struct LoggingHandle {
    switch: Arc<LevelSwitch>,
    pipeline: Arc<Pipeline>,
    shutdown: Shutdown,
    reconciler: JoinHandle<()>,
    transitions: broadcast::Receiver<LevelTransition>,
    shutdown_timeout: Duration,
}

impl LoggingHandle {
    pub fn level_switch(&self) -> &Arc<LevelSwitch> {
        &self.switch
    }

    pub fn current_level(&self) -> Severity {
        self.switch.current()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Receive level transitions applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LevelTransition> {
        self.transitions.resubscribe()
    }

    /// Signal shared with other background tasks of the host.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop the reconciler, then flush and close every sink.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        if let Err(e) = self.reconciler.await {
            tracing::warn!(error = %e, "Level reconciler task failed");
        }

        tracing::info!("Application closed");
        self.pipeline.shutdown(self.shutdown_timeout).await;
    }
}
