//! Record enrichment.
//!
//! The assembler installs these in a fixed order:
//! application name → log context → correlation id → exception details.

use serde_json::Value;

use crate::pipeline::context::LogContext;
use crate::pipeline::correlation::{self, CORRELATION_FIELD};
use crate::pipeline::record::{props, LogRecord};

/// Adds properties to a record before it reaches the sinks.
pub trait Enricher: Send + Sync {
    fn enrich(&self, record: &mut LogRecord);
}

/// Tags every record with the application identity.
#[derive(Debug, Clone)]
pub struct ApplicationNameEnricher {
    name: String,
}

impl ApplicationNameEnricher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Enricher for ApplicationNameEnricher {
    fn enrich(&self, record: &mut LogRecord) {
        record
            .properties
            .entry(props::APPLICATION_NAME.to_string())
            .or_insert_with(|| Value::String(self.name.clone()));
    }
}

/// Copies [`LogContext`] properties onto the record.
///
/// Properties already on the record (from the event or its spans) win.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContextEnricher;

impl Enricher for LogContextEnricher {
    fn enrich(&self, record: &mut LogRecord) {
        LogContext::with_properties(|pushed| {
            // Innermost push wins among the overlays themselves.
            for (name, value) in pushed.iter().rev() {
                record
                    .properties
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        });
    }
}

/// Normalizes the correlation id into `CorrelationId`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationIdEnricher;

impl Enricher for CorrelationIdEnricher {
    fn enrich(&self, record: &mut LogRecord) {
        if let Some(explicit) = record.properties.remove(CORRELATION_FIELD) {
            record
                .properties
                .insert(props::CORRELATION_ID.to_string(), explicit);
            return;
        }
        if record.properties.contains_key(props::CORRELATION_ID) {
            return;
        }
        if let Some(id) = correlation::current() {
            record
                .properties
                .insert(props::CORRELATION_ID.to_string(), Value::String(id.to_string()));
        }
    }
}

/// Attaches structured exception details when the record carries an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionDetailsEnricher;

impl Enricher for ExceptionDetailsEnricher {
    fn enrich(&self, record: &mut LogRecord) {
        let Some(exception) = &record.exception else {
            return;
        };
        if let Ok(detail) = serde_json::to_value(exception) {
            record
                .properties
                .insert(props::EXCEPTION_DETAIL.to_string(), detail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::pipeline::correlation::CorrelationId;
    use crate::pipeline::record::ExceptionDetail;

    fn record() -> LogRecord {
        LogRecord::new(Severity::Information, "test", "hello")
    }

    #[test]
    fn test_application_name_does_not_override() {
        let enricher = ApplicationNameEnricher::new("billing");

        let mut plain = record();
        enricher.enrich(&mut plain);
        assert_eq!(plain.property_text(props::APPLICATION_NAME).as_deref(), Some("billing"));

        let mut explicit = record().with_property(props::APPLICATION_NAME, "other");
        enricher.enrich(&mut explicit);
        assert_eq!(explicit.property_text(props::APPLICATION_NAME).as_deref(), Some("other"));
    }

    #[test]
    fn test_log_context_innermost_wins_but_record_fields_win_overall() {
        let _outer = LogContext::push_property("Tenant", "outer");
        let _inner = LogContext::push_property("Tenant", "inner");
        let _job = LogContext::push_property("JobId", 9);

        let mut plain = record();
        LogContextEnricher.enrich(&mut plain);
        assert_eq!(plain.property_text("Tenant").as_deref(), Some("inner"));
        assert_eq!(plain.properties["JobId"], 9);

        let mut explicit = record().with_property("Tenant", "event");
        LogContextEnricher.enrich(&mut explicit);
        assert_eq!(explicit.property_text("Tenant").as_deref(), Some("event"));
    }

    #[test]
    fn test_correlation_sources() {
        let mut explicit = record().with_property(CORRELATION_FIELD, "abc");
        CorrelationIdEnricher.enrich(&mut explicit);
        assert_eq!(explicit.property_text(props::CORRELATION_ID).as_deref(), Some("abc"));
        assert!(!explicit.properties.contains_key(CORRELATION_FIELD));

        let mut scoped = record();
        correlation::sync_scope(CorrelationId::from("task-1"), || {
            CorrelationIdEnricher.enrich(&mut scoped)
        });
        assert_eq!(scoped.property_text(props::CORRELATION_ID).as_deref(), Some("task-1"));

        let mut none = record();
        CorrelationIdEnricher.enrich(&mut none);
        assert!(!none.properties.contains_key(props::CORRELATION_ID));
    }

    #[test]
    fn test_exception_details_only_when_present() {
        let mut plain = record();
        ExceptionDetailsEnricher.enrich(&mut plain);
        assert!(!plain.properties.contains_key(props::EXCEPTION_DETAIL));

        let mut failed = record().with_exception(ExceptionDetail {
            message: "boom".into(),
            causes: vec!["disk full".into()],
        });
        ExceptionDetailsEnricher.enrich(&mut failed);
        let detail = &failed.properties[props::EXCEPTION_DETAIL];
        assert_eq!(detail["message"], "boom");
        assert_eq!(detail["causes"][0], "disk full");
    }
}
