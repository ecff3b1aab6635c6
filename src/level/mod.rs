//! Dynamic minimum-level subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigSource (every tick)
//!     → reconciler.rs reads a fresh ConfigSnapshot
//!     → parser.rs maps the level name to a Severity
//!     → switch.rs commits it atomically when it differs
//!     → every log call site reads switch.rs before formatting
//! ```
//!
//! # Design Decisions
//! - The switch is a single `AtomicU8`; reads never take a lock
//! - The reconciler is the only writer
//! - Unrecognized names and unavailable configuration keep the last value

pub mod parser;
pub mod reconciler;
pub mod severity;
pub mod switch;

pub use parser::parse_level;
pub use reconciler::{LevelReconciler, LevelTransition, TickOutcome};
pub use severity::{Severity, UnrecognizedLevel};
pub use switch::LevelSwitch;
