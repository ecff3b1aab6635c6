//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     First snapshot → LevelSwitch → assemble Pipeline → (host installs layer)
//!     → spawn LevelReconciler
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop reconciler → "Application closed" → flush sinks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: an invalid present sink endpoint aborts startup
//! - A missing or unreadable first snapshot does not; the level defaults to Information
//! - Sink flushing on shutdown is bounded by a timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{ControlPlane, LoggingHandle, StartError};
