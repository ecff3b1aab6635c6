//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dynamic_logging::config::{ConfigError, ConfigSnapshot, ConfigSource};
use dynamic_logging::pipeline::LogRecord;
use dynamic_logging::sinks::{ShutdownFuture, Sink, SinkKind};

/// A config source whose level (or failure) the test controls.
#[derive(Clone)]
pub struct ScriptedSource {
    level: Arc<Mutex<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(level: &str) -> Self {
        Self {
            level: Arc::new(Mutex::new(Some(level.to_string()))),
        }
    }

    pub fn set_level(&self, level: &str) {
        *self.level.lock().unwrap() = Some(level.to_string());
    }

    pub fn go_offline(&self) {
        *self.level.lock().unwrap() = None;
    }
}

impl ConfigSource for ScriptedSource {
    fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError> {
        match self.level.lock().unwrap().clone() {
            Some(level) => Ok(ConfigSnapshot::with_level(level)),
            None => Err(ConfigError::Unavailable("scripted outage".into())),
        }
    }
}

/// A sink that keeps every record it is given.
pub struct CaptureSink {
    kind: SinkKind,
    records: Mutex<Vec<LogRecord>>,
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self {
            kind: SinkKind::Custom,
            records: Mutex::new(Vec::new()),
        }
    }
}

impl CaptureSink {
    /// Reports itself as the console, so it also receives sink diagnostics.
    pub fn console() -> Self {
        Self {
            kind: SinkKind::Console,
            ..Self::default()
        }
    }

    pub fn find(&self, message: &str) -> Option<LogRecord> {
        self.records().into_iter().find(|r| r.message == message)
    }

    pub fn count_target(&self, target: &str) -> usize {
        self.records().iter().filter(|r| r.target == target).count()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }
}

impl Sink for CaptureSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    fn write(&self, record: &LogRecord) {
        self.records.lock().unwrap().push(record.clone());
    }

    fn shutdown(&self) -> ShutdownFuture {
        Box::pin(async {})
    }
}
