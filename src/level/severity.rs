//! Severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::level::parser::parse_level;

/// Ordered log importance level.
///
/// The discriminants are stable because [`LevelSwitch`](crate::level::LevelSwitch)
/// stores them in an `AtomicU8`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Trace = 0,
    Debug = 1,
    #[default]
    Information = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

/// Returned when a level name does not match any [`Severity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized log level: {0:?}")]
pub struct UnrecognizedLevel(pub String);

impl Severity {
    /// All levels, lowest first.
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Canonical name, as accepted by [`parse_level`].
    pub fn name(self) -> &'static str {
        match self {
            Severity::Trace => "Trace",
            Severity::Debug => "Debug",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Fatal => "Fatal",
        }
    }

    /// Three-letter upper-case form used by the console template.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Severity::Trace => "TRC",
            Severity::Debug => "DBG",
            Severity::Information => "INF",
            Severity::Warning => "WRN",
            Severity::Error => "ERR",
            Severity::Fatal => "FTL",
        }
    }

    /// Syslog severity number (RFC 5424), used by GELF.
    pub fn syslog(self) -> u8 {
        match self {
            Severity::Trace | Severity::Debug => 7,
            Severity::Information => 6,
            Severity::Warning => 4,
            Severity::Error => 3,
            Severity::Fatal => 2,
        }
    }

    pub(crate) fn from_repr(val: u8) -> Self {
        match val {
            0 => Severity::Trace,
            1 => Severity::Debug,
            2 => Severity::Information,
            3 => Severity::Warning,
            4 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = UnrecognizedLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_level(s).ok_or_else(|| UnrecognizedLevel(s.to_string()))
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Information,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
