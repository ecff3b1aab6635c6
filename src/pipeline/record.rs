//! Log records as they travel through enrichers and sinks.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::level::Severity;

/// Well-known property names.
pub mod props {
    pub const APPLICATION_NAME: &str = "ApplicationName";
    pub const CORRELATION_ID: &str = "CorrelationId";
    pub const EXCEPTION_DETAIL: &str = "ExceptionDetail";
    pub const SOURCE_CONTEXT: &str = "SourceContext";
    pub const TRACE_ID: &str = "TraceId";
    pub const SERVER_ID: &str = "ServerId";
}

/// Structured view of an error attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionDetail {
    pub message: String,
    /// `source()` chain, outermost first.
    pub causes: Vec<String>,
}

impl ExceptionDetail {
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            causes,
        }
    }

    /// Multi-line rendering used by text sinks.
    pub fn render(&self) -> String {
        let mut out = self.message.clone();
        for cause in &self.causes {
            let _ = write!(out, "\n ---> {}", cause);
        }
        out
    }
}

/// One log event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Emitting module path.
    pub target: String,
    pub message: String,
    pub properties: BTreeMap<String, Value>,
    pub exception: Option<ExceptionDetail>,
}

impl LogRecord {
    pub fn new(severity: Severity, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            target: target.into(),
            message: message.into(),
            properties: BTreeMap::new(),
            exception: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: ExceptionDetail) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Property value rendered without JSON quoting.
    pub fn property_text(&self, name: &str) -> Option<String> {
        self.properties.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Compact Log Event Format object.
    pub fn to_clef(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "@t".into(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        obj.insert("@l".into(), Value::String(self.severity.name().into()));
        obj.insert("@m".into(), Value::String(self.message.clone()));
        if let Some(exception) = &self.exception {
            obj.insert("@x".into(), Value::String(exception.render()));
        }
        obj.insert(props::SOURCE_CONTEXT.into(), Value::String(self.target.clone()));
        for (name, value) in &self.properties {
            // CLEF reserves the leading '@'.
            let key = if name.starts_with('@') {
                format!("@{}", name)
            } else {
                name.clone()
            };
            obj.insert(key, value.clone());
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);
    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }
    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }
    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }
    impl Error for Inner {}

    #[test]
    fn test_exception_chain() {
        let detail = ExceptionDetail::from_error(&Outer(Inner));
        assert_eq!(detail.message, "request failed");
        assert_eq!(detail.causes, vec!["connection reset".to_string()]);
        assert_eq!(detail.render(), "request failed\n ---> connection reset");
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            serde_json::json!({"message": "request failed", "causes": ["connection reset"]})
        );
    }

    #[test]
    fn test_clef_shape() {
        let record = LogRecord::new(Severity::Warning, "app::db", "slow query")
            .with_property("elapsed_ms", 812)
            .with_property("@weird", "x");
        let clef = record.to_clef();

        assert_eq!(clef["@l"], "Warning");
        assert_eq!(clef["@m"], "slow query");
        assert_eq!(clef["SourceContext"], "app::db");
        assert_eq!(clef["elapsed_ms"], 812);
        assert_eq!(clef["@@weird"], "x");
        assert!(clef.get("@x").is_none());
    }
}
