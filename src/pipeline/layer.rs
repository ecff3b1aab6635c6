//! Bridge from `tracing` into the pipeline.
//!
//! Every callsite is registered as `Interest::sometimes()` so the active
//! level is consulted on each event instead of being cached at first use.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::subscriber::Interest;
use tracing::{Event, Id, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::level::Severity;
use crate::pipeline::record::{ExceptionDetail, LogRecord};
use crate::pipeline::Pipeline;

/// Field that promotes an ERROR event to [`Severity::Fatal`].
pub const FATAL_FIELD: &str = "fatal";

/// A tracing Layer that feeds events into a [`Pipeline`].
#[derive(Clone)]
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

/// Fields recorded on a span, stored in its extensions.
struct SpanFields(BTreeMap<String, Value>);

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // Spans carry context for events that may still be enabled.
        metadata.is_span() || self.pipeline.is_enabled(highest_severity(metadata.level()))
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.fields),
            None => extensions.insert(SpanFields(visitor.fields)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let severity = if visitor.fatal && *metadata.level() == Level::ERROR {
            Severity::Fatal
        } else {
            Severity::from(metadata.level())
        };
        if !self.pipeline.is_enabled(severity) {
            return;
        }

        let mut record = LogRecord::new(
            severity,
            metadata.target(),
            visitor.message.take().unwrap_or_default(),
        );

        // Outer spans first so inner spans and the event override them.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record
                        .properties
                        .extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        record.properties.extend(visitor.fields);
        record.exception = visitor.exception;

        self.pipeline.emit(record);
    }
}

/// The highest severity an event at `level` can end up with.
fn highest_severity(level: &Level) -> Severity {
    if *level == Level::ERROR {
        Severity::Fatal
    } else {
        Severity::from(level)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
    exception: Option<ExceptionDetail>,
    fatal: bool,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);

        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        } else {
            self.insert(field, Value::Bool(value));
        }
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.exception = Some(ExceptionDetail::from_error(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelSwitch;
    use crate::pipeline::assembler::with_sinks;
    use crate::pipeline::record::props;
    use crate::sinks::{ShutdownFuture, Sink, SinkKind};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct Capture(Mutex<Vec<LogRecord>>);

    impl Sink for Capture {
        fn kind(&self) -> SinkKind {
            SinkKind::Custom
        }
        fn write(&self, record: &LogRecord) {
            self.0.lock().unwrap().push(record.clone());
        }
        fn shutdown(&self) -> ShutdownFuture {
            Box::pin(async {})
        }
    }

    fn setup(level: Severity) -> (Arc<LevelSwitch>, Arc<Capture>, impl Subscriber) {
        let switch = Arc::new(LevelSwitch::new(level));
        let capture = Arc::new(Capture::default());
        let pipeline = with_sinks("svc".into(), switch.clone(), vec![capture.clone() as Arc<dyn Sink>]);
        let subscriber = tracing_subscriber::registry().with(PipelineLayer::new(Arc::new(pipeline)));
        (switch, capture, subscriber)
    }

    #[test]
    fn test_level_change_applies_to_existing_callsites() {
        let (switch, capture, subscriber) = setup(Severity::Warning);

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..2 {
                tracing::info!("info line");
                tracing::warn!("warn line");
                switch.set(Severity::Debug);
            }
        });

        let messages: Vec<_> = capture.0.lock().unwrap().iter().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["warn line", "info line", "warn line"]);
    }

    #[test]
    fn test_fatal_field() {
        let (_switch, capture, subscriber) = setup(Severity::Fatal);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("plain error");
            tracing::error!(fatal = true, "unrecoverable");
        });

        let records = capture.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Fatal);
        assert!(!records[0].properties.contains_key(FATAL_FIELD));
    }

    #[test]
    fn test_span_fields_error_and_enrichment() {
        let (_switch, capture, subscriber) = setup(Severity::Trace);
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");

        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("request", correlation_id = "req-9", tenant = "acme");
            let _outer = outer.enter();
            let inner = tracing::info_span!("job", tenant = "override", attempt = tracing::field::Empty);
            let _inner = inner.enter();
            inner.record("attempt", 2);
            tracing::error!(error = &err as &(dyn std::error::Error + 'static), rows = 5u64, "save failed");
        });

        let records = capture.0.lock().unwrap();
        let record = &records[0];
        assert_eq!(record.message, "save failed");
        assert_eq!(record.property_text("tenant").as_deref(), Some("override"));
        assert_eq!(record.properties["attempt"], 2);
        assert_eq!(record.properties["rows"], 5);
        assert_eq!(record.property_text(props::CORRELATION_ID).as_deref(), Some("req-9"));
        assert_eq!(record.property_text(props::APPLICATION_NAME).as_deref(), Some("svc"));
        assert_eq!(record.exception.as_ref().unwrap().message, "disk full");
        assert_eq!(record.properties[props::EXCEPTION_DETAIL]["message"], "disk full");
    }
}
