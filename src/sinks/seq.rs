//! Remote log aggregator sink (Seq).
//!
//! Records are batched and posted as newline-delimited CLEF to
//! `{server}/api/events/raw?clef`.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::config::SeqOptions;
use crate::pipeline::record::LogRecord;
use crate::sinks::queue::WorkerQueue;
use crate::sinks::{ShutdownFuture, Sink, SinkError, SinkKind, SINK_DIAGNOSTICS_TARGET};

pub const CLEF_CONTENT_TYPE: &str = "application/vnd.serilog.clef";
pub const API_KEY_HEADER: &str = "X-Seq-ApiKey";

/// Batching HTTP sink for a Seq server.
pub struct SeqSink {
    queue: WorkerQueue,
}

impl SeqSink {
    /// Validate the endpoint and start the background sender.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(
        server_url: &str,
        api_key: Option<String>,
        options: &SeqOptions,
    ) -> Result<Self, SinkError> {
        let endpoint = ingestion_endpoint(server_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()?;

        let sender = BatchSender {
            client,
            endpoint,
            api_key,
        };
        let batch_size = options.batch_size.max(1);
        let flush_interval = Duration::from_millis(options.flush_interval_ms.max(1));

        let queue = WorkerQueue::spawn("seq", options.queue_capacity, move |rx| {
            sender.run(rx, batch_size, flush_interval)
        });

        Ok(Self { queue })
    }
}

impl Sink for SeqSink {
    fn kind(&self) -> SinkKind {
        SinkKind::RemoteAggregator
    }

    fn write(&self, record: &LogRecord) {
        self.queue.push(record);
    }

    fn shutdown(&self) -> ShutdownFuture {
        self.queue.close()
    }
}

/// Build `{server}/api/events/raw?clef`, keeping any path prefix.
pub fn ingestion_endpoint(server_url: &str) -> Result<Url, SinkError> {
    let invalid = |reason: String| SinkError::InvalidEndpoint {
        endpoint: server_url.to_string(),
        reason,
    };

    let mut base = Url::parse(server_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("api/events/raw?clef")
        .map_err(|e| invalid(e.to_string()))
}

struct BatchSender {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl BatchSender {
    async fn run(
        self,
        mut rx: mpsc::Receiver<LogRecord>,
        batch_size: usize,
        flush_interval: Duration,
    ) {
        let mut batch = Vec::with_capacity(batch_size);
        let mut ticker = time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_size {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => {
                        self.flush(&mut batch).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush(&mut batch).await;
                }
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<LogRecord>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        if let Err(e) = self.post(batch).await {
            tracing::warn!(
                target: SINK_DIAGNOSTICS_TARGET,
                endpoint = %self.endpoint,
                records = count,
                error = %e,
                "Failed to ship log batch to Seq"
            );
        }
        batch.clear();
    }

    async fn post(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        let mut body = String::new();
        for record in batch {
            body.push_str(&serde_json::to_string(&record.to_clef())?);
            body.push('\n');
        }

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, CLEF_CONTENT_TYPE)
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_endpoint() {
        assert_eq!(
            ingestion_endpoint("http://seq:5341").unwrap().as_str(),
            "http://seq:5341/api/events/raw?clef"
        );
        assert_eq!(
            ingestion_endpoint("https://logs.example.com/seq").unwrap().as_str(),
            "https://logs.example.com/seq/api/events/raw?clef"
        );
        assert!(matches!(
            ingestion_endpoint("seq-without-scheme"),
            Err(SinkError::InvalidEndpoint { .. })
        ));
        assert!(ingestion_endpoint("ftp://seq").is_err());
    }
}
