//! Background level reconciliation.
//!
//! # States
//! - Idle: waiting for the next tick, a nudge, or shutdown
//! - Reconciling: one tick in progress
//!
//! # Per Tick
//! ```text
//! fresh ConfigSnapshot ──error──▶ no-op (ConfigUnavailable)
//!     │
//!     ▼
//! parse_level ──None──▶ no-op (UnrecognizedLevel)
//!     │
//!     ▼
//! equal to current? ──yes──▶ no-op
//!     │ no
//!     ▼
//! LevelSwitch::replace + transition event
//! ```
//!
//! Nothing a tick encounters can end the loop; only shutdown does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, MissedTickBehavior};

use crate::config::source::ConfigSource;
use crate::config::ConfigSnapshot;
use crate::level::parser::parse_level;
use crate::level::severity::Severity;
use crate::level::switch::LevelSwitch;
use crate::observability::metrics;

/// Default period between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shorter periods, including zero, are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

const TRANSITION_CHANNEL_CAPACITY: usize = 16;

/// A committed level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTransition {
    pub previous: Severity,
    pub new: Severity,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The switch moved.
    Applied(LevelTransition),
    /// The desired level already matched.
    Unchanged(Severity),
    /// The desired level name did not parse; the switch kept its value.
    Unrecognized(String),
    /// The source failed; the switch kept its value.
    ConfigUnavailable(String),
}

/// Periodically aligns a [`LevelSwitch`] with its [`ConfigSource`].
pub struct LevelReconciler {
    source: Arc<dyn ConfigSource>,
    switch: Arc<LevelSwitch>,
    interval: Duration,
    transitions: broadcast::Sender<LevelTransition>,
    nudges: Option<mpsc::UnboundedReceiver<()>>,
    last_rejected: Option<String>,
}

impl LevelReconciler {
    pub fn new(source: Arc<dyn ConfigSource>, switch: Arc<LevelSwitch>, interval: Duration) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            source,
            switch,
            interval: interval.max(MIN_POLL_INTERVAL),
            transitions,
            nudges: None,
            last_rejected: None,
        }
    }

    /// Run an extra tick whenever `nudges` yields.
    pub fn with_nudges(mut self, nudges: mpsc::UnboundedReceiver<()>) -> Self {
        self.nudges = Some(nudges);
        self
    }

    /// Receive every applied [`LevelTransition`].
    pub fn subscribe(&self) -> broadcast::Receiver<LevelTransition> {
        self.transitions.subscribe()
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// The first tick happens immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            level = %self.switch.current(),
            "Level reconciler started"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut nudges = self.nudges.take();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
                Some(()) = next_nudge(&mut nudges) => {
                    self.tick().await;
                }
            }
        }

        tracing::info!(level = %self.switch.current(), "Level reconciler stopped");
    }

    /// Read a fresh snapshot and reconcile against it.
    pub async fn tick(&mut self) -> TickOutcome {
        let source = self.source.clone();
        let snapshot = match tokio::task::spawn_blocking(move || source.snapshot()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Configuration unavailable, keeping current log level");
                metrics::record_reconcile_failure("config_unavailable");
                return TickOutcome::ConfigUnavailable(e.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Configuration read aborted, keeping current log level");
                metrics::record_reconcile_failure("config_unavailable");
                return TickOutcome::ConfigUnavailable(e.to_string());
            }
        };

        self.apply(&snapshot)
    }

    /// Reconcile against an already-read snapshot.
    pub fn apply(&mut self, snapshot: &ConfigSnapshot) -> TickOutcome {
        let name = &snapshot.desired_level_name;

        let Some(desired) = parse_level(name) else {
            // Warn once per distinct bad value rather than every tick.
            if self.last_rejected.as_deref() != Some(name.as_str()) {
                tracing::warn!(
                    requested = %name,
                    level = %self.switch.current(),
                    "Unrecognized log level, keeping current log level"
                );
                self.last_rejected = Some(name.clone());
            }
            metrics::record_reconcile_failure("unrecognized_level");
            return TickOutcome::Unrecognized(name.clone());
        };
        self.last_rejected = None;

        let current = self.switch.current();
        if desired == current {
            return TickOutcome::Unchanged(current);
        }

        let previous = self.switch.replace(desired);
        let transition = LevelTransition {
            previous,
            new: desired,
        };

        tracing::info!(
            previous = %previous,
            new = %desired,
            "Log level has changed from \"{}\" to \"{}\"",
            previous,
            desired
        );
        metrics::record_level_transition(previous, desired);
        let _ = self.transitions.send(transition);

        TickOutcome::Applied(transition)
    }
}

async fn next_nudge(nudges: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match nudges {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
