//! Configuration schema definitions.
//!
//! [`ConfigSnapshot`] is what the control plane reads from its collaborator;
//! [`LoggingOptions`] tunes the control plane itself and is loaded once.

use serde::{Deserialize, Serialize};

/// One immutable read of external configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ConfigSnapshot {
    /// Application identity attached to every record. `None` means the
    /// [`DefaultNaming`] policy decides.
    pub application_name: Option<String>,

    /// Desired minimum level name, re-read every tick.
    pub desired_level_name: String,

    /// Remote log aggregator (Seq) endpoint.
    pub remote_log_url: Option<String>,

    /// Remote log aggregator API key.
    pub remote_log_api_key: Option<String>,

    /// Structured-log server (GELF) host or URL.
    pub structured_log_url: Option<String>,

    /// Structured-log server port.
    pub structured_log_port: Option<u16>,

    /// `tcp` selects TCP; anything else means UDP.
    pub structured_log_protocol: Option<String>,
}

impl ConfigSnapshot {
    /// Snapshot carrying only a level name.
    pub fn with_level(name: impl Into<String>) -> Self {
        Self {
            desired_level_name: name.into(),
            ..Default::default()
        }
    }

    pub fn application_name(&self) -> Option<&str> {
        non_blank(&self.application_name)
    }

    pub fn remote_log_url(&self) -> Option<&str> {
        non_blank(&self.remote_log_url)
    }

    pub fn remote_log_api_key(&self) -> Option<&str> {
        non_blank(&self.remote_log_api_key)
    }

    pub fn structured_log_url(&self) -> Option<&str> {
        non_blank(&self.structured_log_url)
    }

    pub fn structured_log_protocol(&self) -> Option<&str> {
        non_blank(&self.structured_log_protocol)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// How the application name is derived when the collaborator supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultNaming {
    /// `<executable>_<hostname>`.
    #[default]
    ExecutableAndHost,
    /// `<executable>`.
    Executable,
}

impl DefaultNaming {
    /// Derive a name from the running process.
    pub fn resolve(self) -> String {
        let exe = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        match self {
            DefaultNaming::Executable => exe,
            DefaultNaming::ExecutableAndHost => match hostname::get() {
                Ok(host) => format!("{}_{}", exe, host.to_string_lossy()),
                Err(_) => exe,
            },
        }
    }
}

/// Root options for the logging control plane.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Seconds between level reconciliation ticks.
    pub poll_interval_secs: u64,

    /// Upper bound on sink flushing during shutdown.
    pub shutdown_timeout_secs: u64,

    /// Application name fallback.
    pub default_naming: DefaultNaming,

    pub console: ConsoleOptions,

    pub seq: SeqOptions,

    pub gelf: GelfOptions,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            shutdown_timeout_secs: 5,
            default_naming: DefaultNaming::default(),
            console: ConsoleOptions::default(),
            seq: SeqOptions::default(),
            gelf: GelfOptions::default(),
        }
    }
}

/// Console sink options.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleOptions {
    pub format: ConsoleFormat,
}

/// Console line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    /// Human-readable template line.
    #[default]
    Template,
    /// One JSON object per line.
    Json,
}

/// Remote aggregator (Seq) sink options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SeqOptions {
    /// Records per HTTP request.
    pub batch_size: usize,

    /// Maximum time a record waits before its batch is sent.
    pub flush_interval_ms: u64,

    pub request_timeout_secs: u64,

    /// Records held for the sender before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for SeqOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval_ms: 2000,
            request_timeout_secs: 10,
            queue_capacity: 100_000,
        }
    }
}

/// Structured-log server (GELF) sink options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GelfOptions {
    /// UDP datagrams larger than this are chunked.
    pub max_chunk_size: usize,

    pub connect_timeout_secs: u64,

    /// Records held for the sender before new ones are dropped.
    pub queue_capacity: usize,

    /// First pause after a failed send; doubles per consecutive failure.
    pub retry_initial_ms: u64,

    /// Longest pause between send attempts.
    pub retry_max_ms: u64,
}

impl Default for GelfOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 8192,
            connect_timeout_secs: 5,
            queue_capacity: 100_000,
            retry_initial_ms: 1000,
            retry_max_ms: 30_000,
        }
    }
}
