//! Hand-off between log call sites and a sink's background worker.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::pipeline::record::LogRecord;
use crate::sinks::ShutdownFuture;

/// Sender side of a bounded worker queue.
///
/// Enqueueing takes no lock and never waits; a full or closed queue drops
/// the record. Closing swaps the sender out so the worker sees the channel
/// end once in-flight writes finish.
pub struct WorkerQueue {
    name: &'static str,
    tx: ArcSwapOption<mpsc::Sender<LogRecord>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerQueue {
    /// Spawn `worker` on the current Tokio runtime, feeding it from a new
    /// queue holding at most `capacity` records.
    pub fn spawn<F, Fut>(name: &'static str, capacity: usize, worker: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<LogRecord>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(worker(rx));
        Self {
            name,
            tx: ArcSwapOption::from(Some(Arc::new(tx))),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue a copy of `record`. Returns `false` if it was dropped.
    pub fn push(&self, record: &LogRecord) -> bool {
        let guard = self.tx.load();
        let delivered = match guard.as_ref() {
            Some(tx) => match tx.try_send(record.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
            },
            None => false,
        };
        if !delivered {
            metrics::record_dropped(self.name);
        }
        delivered
    }

    /// Close the queue; the future resolves when the worker exits.
    ///
    /// Dropping the future before then aborts the worker, so a shutdown
    /// deadline also stops whatever the worker still had queued.
    pub fn close(&self) -> ShutdownFuture {
        self.tx.store(None);
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        Box::pin(async move {
            let mut worker = AbortOnDrop(handle);
            if let Some(handle) = worker.0.as_mut() {
                let _ = handle.await;
            }
            worker.0 = None;
        })
    }
}

struct AbortOnDrop(Option<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
