//! Structured-log server sink (GELF 1.1).
//!
//! # Transports
//! - UDP: one datagram per message, chunked when larger than the
//!   configured chunk size (at most 128 chunks)
//! - TCP: null-byte-terminated frames over one connection, re-established
//!   on failure
//!
//! A failed send suspends the shipper for a backoff window; records that
//! arrive inside it are dropped and the failure is reported once.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use url::Url;
use uuid::Uuid;

use crate::config::GelfOptions;
use crate::observability::metrics;
use crate::pipeline::record::{props, LogRecord};
use crate::sinks::backoff::ReconnectBackoff;
use crate::sinks::queue::WorkerQueue;
use crate::sinks::{ShutdownFuture, Sink, SinkError, SinkKind, SINK_DIAGNOSTICS_TARGET};

const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];
const CHUNK_HEADER_LEN: usize = 12;
pub const MAX_CHUNKS: usize = 128;
const SHORT_MESSAGE_LIMIT: usize = 250;

/// Network transport for the GELF sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    /// `tcp` (any case) selects TCP; anything else, including nothing, is UDP.
    pub fn from_protocol(protocol: Option<&str>) -> Self {
        match protocol {
            Some(p) if p.trim().eq_ignore_ascii_case("tcp") => Transport::Tcp,
            _ => Transport::Udp,
        }
    }
}

/// Sink for a Graylog (or any GELF) input.
pub struct GelfSink {
    queue: WorkerQueue,
}

impl GelfSink {
    /// Start the background sender.
    ///
    /// `server` may be a bare host name or a URL whose host is used.
    /// Must be called inside a Tokio runtime.
    pub fn spawn(
        server: &str,
        port: u16,
        transport: Transport,
        source_host: String,
        options: &GelfOptions,
    ) -> Result<Self, SinkError> {
        let host = server_host(server)?;
        let shipper = Shipper {
            host,
            port,
            transport,
            source_host,
            max_chunk_size: options.max_chunk_size,
            connect_timeout: Duration::from_secs(options.connect_timeout_secs),
            backoff: ReconnectBackoff::new(
                Duration::from_millis(options.retry_initial_ms),
                Duration::from_millis(options.retry_max_ms),
            ),
        };

        let queue = WorkerQueue::spawn("gelf", options.queue_capacity, move |rx| shipper.run(rx));

        Ok(Self { queue })
    }
}

impl Sink for GelfSink {
    fn kind(&self) -> SinkKind {
        SinkKind::StructuredServer
    }

    fn write(&self, record: &LogRecord) {
        self.queue.push(record);
    }

    fn shutdown(&self) -> ShutdownFuture {
        self.queue.close()
    }
}

/// Extract the host from `server`, which may be a URL or a bare host.
pub fn server_host(server: &str) -> Result<String, SinkError> {
    let server = server.trim();
    let invalid = |reason: &str| SinkError::InvalidEndpoint {
        endpoint: server.to_string(),
        reason: reason.to_string(),
    };

    if server.contains("://") {
        let url = Url::parse(server).map_err(|e| invalid(&e.to_string()))?;
        return url
            .host_str()
            .map(|h| h.trim_matches(|c| c == '[' || c == ']').to_string())
            .ok_or_else(|| invalid("URL has no host"));
    }
    if server.is_empty() || server.contains(['/', ' ']) {
        return Err(invalid("not a host name"));
    }
    Ok(server.to_string())
}

/// Encode a record as a GELF 1.1 message.
pub fn encode(record: &LogRecord, source_host: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("version".into(), Value::from("1.1"));
    obj.insert("host".into(), Value::from(source_host));

    let first_line = record.message.lines().next().unwrap_or_default();
    let short: String = first_line.chars().take(SHORT_MESSAGE_LIMIT).collect();
    obj.insert("short_message".into(), Value::from(short));

    let mut full = record.message.clone();
    if let Some(exception) = &record.exception {
        full.push('\n');
        full.push_str(&exception.render());
    }
    if full != first_line {
        obj.insert("full_message".into(), Value::from(full));
    }

    obj.insert(
        "timestamp".into(),
        Value::from(record.timestamp.timestamp_millis() as f64 / 1000.0),
    );
    obj.insert("level".into(), Value::from(record.severity.syslog()));
    obj.insert(
        format!("_{}", props::SOURCE_CONTEXT),
        Value::from(record.target.clone()),
    );
    obj.insert("_Level".into(), Value::from(record.severity.name()));

    for (name, value) in &record.properties {
        let key = additional_field_name(name);
        let value = match value {
            Value::String(_) | Value::Number(_) => value.clone(),
            Value::Null => continue,
            other => Value::from(other.to_string()),
        };
        obj.insert(key, value);
    }
    Value::Object(obj)
}

/// `_`-prefixed name restricted to `[\w.\-]`; `_id` is reserved.
fn additional_field_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned == "id" {
        "_id_".to_string()
    } else {
        format!("_{}", cleaned)
    }
}

/// Split `payload` into GELF chunks of at most `max_chunk_size` bytes.
///
/// Payloads that fit are returned as a single unframed datagram.
pub fn chunk(payload: &[u8], max_chunk_size: usize, message_id: [u8; 8]) -> Result<Vec<Vec<u8>>, SinkError> {
    if payload.len() <= max_chunk_size {
        return Ok(vec![payload.to_vec()]);
    }

    let body = max_chunk_size.saturating_sub(CHUNK_HEADER_LEN).max(1);
    let count = payload.len().div_ceil(body);
    if count > MAX_CHUNKS {
        return Err(SinkError::TooManyChunks {
            chunks: count,
            limit: MAX_CHUNKS,
        });
    }

    Ok(payload
        .chunks(body)
        .enumerate()
        .map(|(seq, part)| {
            let mut datagram = Vec::with_capacity(CHUNK_HEADER_LEN + part.len());
            datagram.extend_from_slice(&CHUNK_MAGIC);
            datagram.extend_from_slice(&message_id);
            datagram.push(seq as u8);
            datagram.push(count as u8);
            datagram.extend_from_slice(part);
            datagram
        })
        .collect())
}

fn message_id() -> [u8; 8] {
    let mut id = [0u8; 8];
    id.copy_from_slice(&Uuid::new_v4().as_bytes()[..8]);
    id
}

struct Shipper {
    host: String,
    port: u16,
    transport: Transport,
    source_host: String,
    max_chunk_size: usize,
    connect_timeout: Duration,
    backoff: ReconnectBackoff,
}

/// Open connection state, per transport.
enum Link {
    Udp(Option<(UdpSocket, SocketAddr)>),
    Tcp(Option<TcpStream>),
}

impl Shipper {
    async fn run(mut self, mut rx: mpsc::Receiver<LogRecord>) {
        let mut link = match self.transport {
            Transport::Udp => Link::Udp(None),
            Transport::Tcp => Link::Tcp(None),
        };

        while let Some(record) = rx.recv().await {
            if self.backoff.is_suspended(Instant::now()) {
                self.backoff.drop_record();
                metrics::record_dropped("gelf");
                continue;
            }

            let sent = match &mut link {
                Link::Udp(socket) => self.send_udp(socket, &record).await,
                Link::Tcp(stream) => self.send_tcp(stream, &record).await,
            };
            match sent {
                Ok(()) => {
                    if let Some(dropped) = self.backoff.record_success() {
                        tracing::info!(
                            target: SINK_DIAGNOSTICS_TARGET,
                            host = %self.host,
                            port = self.port,
                            dropped,
                            "GELF server reachable again"
                        );
                    }
                }
                Err(e @ (SinkError::Encode(_) | SinkError::TooManyChunks { .. })) => {
                    metrics::record_dropped("gelf");
                    tracing::warn!(
                        target: SINK_DIAGNOSTICS_TARGET,
                        error = %e,
                        "Dropped log record that cannot be sent as GELF"
                    );
                }
                Err(e) => {
                    link = match self.transport {
                        Transport::Udp => Link::Udp(None),
                        Transport::Tcp => Link::Tcp(None),
                    };
                    metrics::record_dropped("gelf");
                    let retry_in = self.backoff.record_failure(Instant::now());
                    self.report(&e, retry_in);
                }
            }
        }

        if let Link::Tcp(Some(mut stream)) = link {
            let _ = stream.shutdown().await;
        }
    }

    fn report(&self, error: &SinkError, retry_in: Duration) {
        tracing::warn!(
            target: SINK_DIAGNOSTICS_TARGET,
            host = %self.host,
            port = self.port,
            transport = ?self.transport,
            retry_in = ?retry_in,
            error = %error,
            "Failed to ship log record to GELF server, pausing sends"
        );
    }

    async fn resolve(&self) -> Result<SocketAddr, SinkError> {
        lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| SinkError::InvalidEndpoint {
                endpoint: format!("{}:{}", self.host, self.port),
                reason: "host did not resolve".into(),
            })
    }

    async fn send_udp(
        &self,
        link: &mut Option<(UdpSocket, SocketAddr)>,
        record: &LogRecord,
    ) -> Result<(), SinkError> {
        if link.is_none() {
            let addr = self.resolve().await?;
            let bind: SocketAddr = if addr.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            *link = Some((UdpSocket::bind(bind).await?, addr));
        }
        let Some((socket, addr)) = link.as_ref() else {
            return Ok(());
        };

        let payload = serde_json::to_vec(&encode(record, &self.source_host))?;
        for datagram in chunk(&payload, self.max_chunk_size, message_id())? {
            socket.send_to(&datagram, addr).await?;
        }
        Ok(())
    }

    async fn send_tcp(&self, stream: &mut Option<TcpStream>, record: &LogRecord) -> Result<(), SinkError> {
        let mut frame = serde_json::to_vec(&encode(record, &self.source_host))?;
        frame.push(0);

        if let Some(open) = stream.as_mut() {
            if open.write_all(&frame).await.is_ok() {
                return Ok(());
            }
            *stream = None;
        }

        let addr = self.resolve().await?;
        let mut fresh = time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
        fresh.write_all(&frame).await?;
        *stream = Some(fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::pipeline::record::ExceptionDetail;

    #[test]
    fn test_transport_selection() {
        assert_eq!(Transport::from_protocol(Some("TCP")), Transport::Tcp);
        assert_eq!(Transport::from_protocol(Some("tcp")), Transport::Tcp);
        assert_eq!(Transport::from_protocol(Some("Tcp")), Transport::Tcp);
        assert_eq!(Transport::from_protocol(Some("udp")), Transport::Udp);
        assert_eq!(Transport::from_protocol(Some("http")), Transport::Udp);
        assert_eq!(Transport::from_protocol(None), Transport::Udp);
    }

    #[test]
    fn test_server_host() {
        assert_eq!(server_host("graylog").unwrap(), "graylog");
        assert_eq!(server_host("udp://graylog.local:12201").unwrap(), "graylog.local");
        assert_eq!(server_host("http://[::1]:12201").unwrap(), "::1");
        assert!(server_host("graylog/path").is_err());
    }

    #[test]
    fn test_encode_fields() {
        let record = LogRecord::new(Severity::Error, "app::db", "write failed\nretrying")
            .with_property("id", "x")
            .with_property("user name", "bob")
            .with_property("attempt", 3)
            .with_property("tags", serde_json::json!(["a", "b"]))
            .with_exception(ExceptionDetail {
                message: "disk full".into(),
                causes: vec![],
            });
        let msg = encode(&record, "box-1");

        assert_eq!(msg["version"], "1.1");
        assert_eq!(msg["host"], "box-1");
        assert_eq!(msg["short_message"], "write failed");
        assert_eq!(msg["full_message"], "write failed\nretrying\ndisk full");
        assert_eq!(msg["level"], 3);
        assert_eq!(msg["_SourceContext"], "app::db");
        assert_eq!(msg["_id_"], "x");
        assert_eq!(msg["_user_name"], "bob");
        assert_eq!(msg["_attempt"], 3);
        assert_eq!(msg["_tags"], "[\"a\",\"b\"]");
    }

    #[test]
    fn test_chunking() {
        let id = [1, 2, 3, 4, 5, 6, 7, 8];
        let small = chunk(b"tiny", 600, id).unwrap();
        assert_eq!(small, vec![b"tiny".to_vec()]);

        let payload = vec![b'x'; 1000];
        let chunks = chunk(&payload, 512, id).unwrap();
        assert_eq!(chunks.len(), 2);
        for (seq, c) in chunks.iter().enumerate() {
            assert_eq!(&c[..2], &CHUNK_MAGIC);
            assert_eq!(&c[2..10], &id);
            assert_eq!(c[10] as usize, seq);
            assert_eq!(c[11], 2);
            assert!(c.len() <= 512);
        }
        let body: usize = chunks.iter().map(|c| c.len() - CHUNK_HEADER_LEN).sum();
        assert_eq!(body, 1000);

        let huge = vec![b'x'; 600 * 200];
        assert!(matches!(chunk(&huge, 512, id), Err(SinkError::TooManyChunks { .. })));
    }
}
