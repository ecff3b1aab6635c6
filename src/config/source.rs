//! Snapshot sources.
//!
//! A [`ConfigSource`] is the collaborator that resolves configuration; the
//! control plane only ever sees the flat [`ConfigSnapshot`] it returns.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::schema::ConfigSnapshot;
use crate::config::ConfigError;

/// Environment variable names read by [`EnvConfigSource`].
pub mod keys {
    pub const APPLICATION_NAME: &str = "APPLICATION_NAME";
    pub const MINIMUM_LOG_LEVEL: &str = "MINIMUM_LOG_LEVEL";
    pub const SEQ_URL: &str = "SEQ_URL";
    pub const SEQ_API_KEY: &str = "SEQ_API_KEY";
    pub const GRAYLOG_URL: &str = "GRAYLOG_URL";
    pub const GRAYLOG_PORT: &str = "GRAYLOG_PORT";
    pub const GRAYLOG_PROTOCOL: &str = "GRAYLOG_PROTOCOL";
}

/// Level name used when the source does not name one.
pub const DEFAULT_LEVEL_NAME: &str = "Information";

/// Produces a fresh [`ConfigSnapshot`] on every call.
///
/// Implementations may block briefly; the reconciler calls them off the
/// async worker threads.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<ConfigSnapshot, ConfigError> + Send + Sync,
{
    fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError> {
        self()
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the snapshot from process environment variables.
pub struct EnvConfigSource {
    lookup: Lookup,
}

impl EnvConfigSource {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Use a custom variable lookup instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }
}

impl Default for EnvConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvConfigSource {
    fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError> {
        Ok(ConfigSnapshot {
            application_name: self.var(keys::APPLICATION_NAME),
            desired_level_name: self
                .var(keys::MINIMUM_LOG_LEVEL)
                .unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string()),
            remote_log_url: self.var(keys::SEQ_URL),
            remote_log_api_key: self.var(keys::SEQ_API_KEY),
            structured_log_url: self.var(keys::GRAYLOG_URL),
            structured_log_port: self
                .var(keys::GRAYLOG_PORT)
                .and_then(|p| p.trim().parse().ok()),
            structured_log_protocol: self.var(keys::GRAYLOG_PROTOCOL),
        })
    }
}

/// On-disk layout read by [`FileConfigSource`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotDocument {
    application_name: Option<String>,
    minimum_log_level: Option<String>,
    seq_url: Option<String>,
    seq_api_key: Option<String>,
    graylog_url: Option<String>,
    graylog_port: Option<i64>,
    graylog_protocol: Option<String>,
}

/// Re-reads a TOML snapshot file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let doc: SnapshotDocument = toml::from_str(&content)?;

        Ok(ConfigSnapshot {
            application_name: doc.application_name,
            desired_level_name: doc
                .minimum_log_level
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string()),
            remote_log_url: doc.seq_url,
            remote_log_api_key: doc.seq_api_key,
            structured_log_url: doc.graylog_url,
            structured_log_port: doc.graylog_port.and_then(|p| u16::try_from(p).ok()),
            structured_log_protocol: doc.graylog_protocol,
        })
    }
}
