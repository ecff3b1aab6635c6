//! Pipeline assembly.
//!
//! # Responsibilities
//! - Decide which sinks a snapshot enables ([`plan`], pure)
//! - Build the enrichers and sinks in fixed order ([`assemble`], once at startup)
//!
//! # Rules
//! - Console: always
//! - Remote aggregator: `remote_log_url` non-blank; API key passed when present
//! - Structured server: `structured_log_url` non-blank and port present;
//!   TCP when the protocol is `tcp` (any case), otherwise UDP
//!
//! A sink whose required fields are missing is omitted, never an error.
//! Only fields that are present get validated.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigSnapshot, ConsoleFormat, LoggingOptions};
use crate::level::LevelSwitch;
use crate::pipeline::enrich::{
    ApplicationNameEnricher, CorrelationIdEnricher, Enricher, ExceptionDetailsEnricher,
    LogContextEnricher,
};
use crate::pipeline::Pipeline;
use crate::sinks::{ConsoleSink, GelfSink, SeqSink, Sink, SinkError, Transport};

/// One sink the snapshot enables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSpec {
    Console {
        format: ConsoleFormat,
    },
    RemoteAggregator {
        url: String,
        api_key: Option<String>,
    },
    StructuredServer {
        server: String,
        port: u16,
        transport: Transport,
    },
}

/// Everything assembly decides before touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkPlan {
    pub application_name: String,
    pub sinks: Vec<SinkSpec>,
}

impl SinkPlan {
    pub fn structured_transport(&self) -> Option<Transport> {
        self.sinks.iter().find_map(|s| match s {
            SinkSpec::StructuredServer { transport, .. } => Some(*transport),
            _ => None,
        })
    }
}

/// A present field failed validation.
#[derive(Debug, Error)]
#[error("cannot build {sink} sink: {source}")]
pub struct AssembleError {
    pub sink: &'static str,
    #[source]
    pub source: SinkError,
}

/// Decide the sinks and application name for `snapshot`.
pub fn plan(snapshot: &ConfigSnapshot, options: &LoggingOptions) -> SinkPlan {
    let application_name = snapshot
        .application_name()
        .map(str::to_string)
        .unwrap_or_else(|| options.default_naming.resolve());

    let mut sinks = vec![SinkSpec::Console {
        format: options.console.format,
    }];

    if let Some(url) = snapshot.remote_log_url() {
        sinks.push(SinkSpec::RemoteAggregator {
            url: url.to_string(),
            api_key: snapshot.remote_log_api_key().map(str::to_string),
        });
    }

    if let (Some(server), Some(port)) = (snapshot.structured_log_url(), snapshot.structured_log_port) {
        sinks.push(SinkSpec::StructuredServer {
            server: server.to_string(),
            port,
            transport: Transport::from_protocol(snapshot.structured_log_protocol()),
        });
    }

    SinkPlan {
        application_name,
        sinks,
    }
}

/// Build the pipeline for `snapshot`. Must be called inside a Tokio runtime
/// when remote sinks are enabled.
pub fn assemble(
    snapshot: &ConfigSnapshot,
    switch: Arc<LevelSwitch>,
    options: &LoggingOptions,
) -> Result<Pipeline, AssembleError> {
    let plan = plan(snapshot, options);
    let sinks = plan
        .sinks
        .iter()
        .map(|spec| build_sink(spec, &plan.application_name, options))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(with_sinks(plan.application_name, switch, sinks))
}

/// Build a pipeline around already-constructed sinks, with the standard
/// enrichers.
pub fn with_sinks(
    application_name: String,
    switch: Arc<LevelSwitch>,
    sinks: Vec<Arc<dyn Sink>>,
) -> Pipeline {
    let enrichers: Vec<Box<dyn Enricher>> = vec![
        Box::new(ApplicationNameEnricher::new(application_name.clone())),
        Box::new(LogContextEnricher),
        Box::new(CorrelationIdEnricher),
        Box::new(ExceptionDetailsEnricher),
    ];

    tracing::debug!(
        application = %application_name,
        sinks = ?sinks.iter().map(|s| s.kind()).collect::<Vec<_>>(),
        "Logging pipeline assembled"
    );

    Pipeline::new(application_name, switch, enrichers, sinks)
}

fn build_sink(
    spec: &SinkSpec,
    application_name: &str,
    options: &LoggingOptions,
) -> Result<Arc<dyn Sink>, AssembleError> {
    let sink: Arc<dyn Sink> = match spec {
        SinkSpec::Console { format } => Arc::new(ConsoleSink::stdout(*format)),
        SinkSpec::RemoteAggregator { url, api_key } => Arc::new(
            SeqSink::spawn(url, api_key.clone(), &options.seq).map_err(|source| AssembleError {
                sink: "remote aggregator",
                source,
            })?,
        ),
        SinkSpec::StructuredServer {
            server,
            port,
            transport,
        } => {
            let source_host = hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| application_name.to_string());
            Arc::new(
                GelfSink::spawn(server, *port, *transport, source_host, &options.gelf).map_err(
                    |source| AssembleError {
                        sink: "structured server",
                        source,
                    },
                )?,
            )
        }
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::SinkKind;

    fn options() -> LoggingOptions {
        LoggingOptions::default()
    }

    fn full_snapshot(protocol: Option<&str>) -> ConfigSnapshot {
        ConfigSnapshot {
            application_name: Some("billing".into()),
            desired_level_name: "Information".into(),
            remote_log_url: Some("http://127.0.0.1:5341".into()),
            remote_log_api_key: None,
            structured_log_url: Some("127.0.0.1".into()),
            structured_log_port: Some(12201),
            structured_log_protocol: protocol.map(str::to_string),
        }
    }

    #[test]
    fn test_blank_endpoints_console_only() {
        let snapshot = ConfigSnapshot {
            remote_log_url: Some("  ".into()),
            structured_log_url: Some(String::new()),
            structured_log_port: Some(12201),
            ..ConfigSnapshot::with_level("Information")
        };
        let plan = plan(&snapshot, &options());
        assert_eq!(plan.sinks, vec![SinkSpec::Console { format: ConsoleFormat::Template }]);
    }

    #[test]
    fn test_structured_requires_port() {
        let snapshot = ConfigSnapshot {
            structured_log_url: Some("graylog".into()),
            ..ConfigSnapshot::with_level("Information")
        };
        assert_eq!(plan(&snapshot, &options()).sinks.len(), 1);
    }

    #[test]
    fn test_api_key_passthrough() {
        let mut snapshot = full_snapshot(None);
        snapshot.remote_log_api_key = Some("secret".into());
        let plan = plan(&snapshot, &options());
        assert!(plan.sinks.contains(&SinkSpec::RemoteAggregator {
            url: "http://127.0.0.1:5341".into(),
            api_key: Some("secret".into()),
        }));

        snapshot.remote_log_api_key = Some(" ".into());
        let plan = super::plan(&snapshot, &options());
        assert!(plan.sinks.contains(&SinkSpec::RemoteAggregator {
            url: "http://127.0.0.1:5341".into(),
            api_key: None,
        }));
    }

    #[test]
    fn test_transport_from_protocol() {
        for (protocol, expected) in [
            (Some("TCP"), Transport::Tcp),
            (Some("tcp"), Transport::Tcp),
            (Some("udp"), Transport::Udp),
            (Some("websocket"), Transport::Udp),
            (None, Transport::Udp),
        ] {
            let plan = plan(&full_snapshot(protocol), &options());
            assert_eq!(plan.structured_transport(), Some(expected), "{:?}", protocol);
        }
    }

    #[test]
    fn test_application_name_fallback() {
        let snapshot = ConfigSnapshot::with_level("Debug");
        let mut opts = options();
        opts.default_naming = crate::config::DefaultNaming::Executable;
        assert_eq!(plan(&snapshot, &opts).application_name, opts.default_naming.resolve());
        assert_eq!(plan(&full_snapshot(None), &opts).application_name, "billing");
    }

    #[tokio::test]
    async fn test_assemble_three_sinks() {
        let switch = Arc::new(LevelSwitch::default());
        let pipeline = assemble(&full_snapshot(Some("udp")), switch, &options()).unwrap();
        assert_eq!(
            pipeline.sink_kinds(),
            vec![SinkKind::Console, SinkKind::RemoteAggregator, SinkKind::StructuredServer]
        );
        assert_eq!(pipeline.application_name(), "billing");
        pipeline.shutdown(std::time::Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_assemble_console_only() {
        let switch = Arc::new(LevelSwitch::default());
        let pipeline = assemble(&ConfigSnapshot::with_level("Debug"), switch, &options()).unwrap();
        assert_eq!(pipeline.sink_kinds(), vec![SinkKind::Console]);
    }

    #[tokio::test]
    async fn test_present_but_invalid_url_is_an_error() {
        let mut snapshot = full_snapshot(None);
        snapshot.remote_log_url = Some("not a url".into());
        let err = assemble(&snapshot, Arc::new(LevelSwitch::default()), &options()).unwrap_err();
        assert_eq!(err.sink, "remote aggregator");
    }
}
