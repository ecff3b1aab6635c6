//! Logging control plane host.
//!
//! ```text
//!   environment / snapshot file
//!            │
//!            ▼
//!   ┌─────────────────┐  once   ┌───────────────────────────────────────────┐
//!   │  ConfigSource   │────────▶│ Pipeline                                  │
//!   └────────┬────────┘         │  app name → context → correlation → error │
//!            │ every tick       │  → console [→ Seq] [→ GELF]               │
//!            ▼                  └───────────────▲───────────────────────────┘
//!   ┌─────────────────┐  set    ┌───────────────┴─┐
//!   │ LevelReconciler │────────▶│   LevelSwitch   │◀── read by every call site
//!   └─────────────────┘         └─────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use dynamic_logging::config::loader::load_options;
use dynamic_logging::config::watcher::SnapshotWatcher;
use dynamic_logging::lifecycle::signals::wait_for_signal;
use dynamic_logging::lifecycle::Shutdown;
use dynamic_logging::observability::{logging, metrics};
use dynamic_logging::pipeline::{correlation, CorrelationId};
use dynamic_logging::{ConfigSource, ControlPlane, EnvConfigSource, FileConfigSource, LoggingOptions};

#[derive(Parser)]
#[command(name = "dynamic-logging")]
#[command(about = "Logging control plane with a runtime-adjustable minimum level", long_about = None)]
struct Cli {
    /// Control plane options (TOML).
    #[arg(long)]
    options: Option<PathBuf>,

    /// Read configuration snapshots from this TOML file instead of the environment.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Override the reconciliation period.
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Emit sample records at every level until shutdown.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut options = match &cli.options {
        Some(path) => load_options(path)?,
        None => LoggingOptions::default(),
    };
    if let Some(secs) = cli.poll_interval_secs.filter(|s| *s > 0) {
        options.poll_interval_secs = secs;
    }

    let source: Arc<dyn ConfigSource> = match &cli.snapshot {
        Some(path) => Arc::new(FileConfigSource::new(path)),
        None => Arc::new(EnvConfigSource::new()),
    };

    let mut plane = ControlPlane::build(source, options)?;
    logging::install(plane.layer())?;

    if let Some(addr) = cli.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    // Kept alive until shutdown.
    let _watcher = match &cli.snapshot {
        Some(path) => {
            let (watcher, nudges) = SnapshotWatcher::new(path);
            plane = plane.with_nudges(nudges);
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot watcher unavailable, relying on polling");
                    None
                }
            }
        }
        None => None,
    };

    let handle = plane.start();

    let demo = cli.demo.then(|| tokio::spawn(run_demo(handle.shutdown_signal())));

    wait_for_signal().await?;
    handle.shutdown_signal().trigger();
    if let Some(demo) = demo {
        let _ = demo.await;
    }
    handle.shutdown().await;
    Ok(())
}

/// Emit one record per level every 400 ms.
async fn run_demo(shutdown: Shutdown) {
    let mut stop = shutdown.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_millis(400));

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            _ = ticker.tick() => {
                correlation::scope(CorrelationId::new(), async {
                    tracing::trace!("Trace...");
                    tracing::debug!("Debug...");
                    tracing::info!("Info...");
                    tracing::warn!("Warn...");
                    tracing::error!("Error...");
                    tracing::error!(fatal = true, "Fatal...");
                })
                .await;
            }
        }
    }
}
