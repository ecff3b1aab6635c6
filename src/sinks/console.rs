//! Console sink.
//!
//! Text layout:
//! ```text
//! [2024-05-01 13:45:12.345 +02:00 | INF] [app::jobs] [CorrelationId: 7f..] message
//! error message
//!  ---> cause
//! ```
//! Bracketed context segments appear only when the property is present.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Local;

use crate::config::ConsoleFormat;
use crate::pipeline::record::{props, LogRecord};
use crate::sinks::{ShutdownFuture, Sink, SinkKind};

/// Writes one line (or block) per record.
pub struct ConsoleSink {
    format: ConsoleFormat,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Console sink on stdout.
    pub fn stdout(format: ConsoleFormat) -> Self {
        Self::with_writer(format, io::stdout())
    }

    /// Console sink on an arbitrary writer.
    pub fn with_writer(format: ConsoleFormat, out: impl Write + Send + 'static) -> Self {
        Self {
            format,
            out: Mutex::new(Box::new(out)),
        }
    }
}

impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn write(&self, record: &LogRecord) {
        let line = match self.format {
            ConsoleFormat::Template => render_template(record),
            ConsoleFormat::Json => {
                let mut line = record.to_clef().to_string();
                line.push('\n');
                line
            }
        };
        if let Ok(mut out) = self.out.lock() {
            // Nowhere left to report a failed console write.
            let _ = out.write_all(line.as_bytes());
        }
    }

    fn shutdown(&self) -> ShutdownFuture {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
        Box::pin(async {})
    }
}

/// Render a record with the text template.
pub fn render_template(record: &LogRecord) -> String {
    let timestamp = record
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.3f %:z");

    let mut line = format!("[{} | {}]", timestamp, record.severity.abbreviation());

    if !record.target.is_empty() {
        line.push_str(&format!(" [{}]", record.target));
    }
    for (name, label) in [
        (props::CORRELATION_ID, "CorrelationId"),
        (props::TRACE_ID, "TraceId"),
        (props::SERVER_ID, "ServerId"),
    ] {
        if let Some(value) = record.property_text(name) {
            line.push_str(&format!(" [{}: {}]", label, value));
        }
    }

    line.push(' ');
    line.push_str(&record.message);
    line.push('\n');

    if let Some(exception) = &record.exception {
        line.push_str(&exception.render());
        line.push('\n');
    }
    line
}
