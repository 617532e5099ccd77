//! Bounded queue, background worker, and retried HTTP delivery for
//! telemetry events.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const STATUS_BODY_PREVIEW: usize = 200;
const MAX_RETRIES: u32 = 3;
const BACKOFF_SECONDS: [u64; MAX_RETRIES as usize] = [1, 2, 4];
const INGEST_TIMEOUT: Duration = Duration::from_secs(10);
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How batches are delivered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// `POST {endpoint}/v1/ingest` with retry/backoff.
    Http,
    /// Batch-publish through a message-bus style collaborator.
    EventBridge,
}

/// Configuration recognized by the transport (mirrors the SDK's public
/// configuration surface for the transport-relevant subset).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint_url: String,
    pub api_key: String,
    pub mode: TransportMode,
    pub event_bus_name: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://api.invokelens.com".to_string(),
            api_key: String::new(),
            mode: TransportMode::Http,
            event_bus_name: "invokelens-bus".to_string(),
            batch_size: 10,
            flush_interval: Duration::from_secs(5),
            max_queue_size: 1000,
        }
    }
}

#[derive(Debug, Error)]
enum FlushError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("permanent client error: {status}, body: {body_preview}")]
    Permanent { status: reqwest::StatusCode, body_preview: String },
    #[error("server error: {0}")]
    Retryable(reqwest::StatusCode),
}

/// One EventBridge-style batch-publish entry.
#[derive(Debug, Serialize)]
struct BusEntry<'a> {
    #[serde(rename = "Source")]
    source: &'a str,
    #[serde(rename = "DetailType")]
    detail_type: &'a str,
    #[serde(rename = "Detail")]
    detail: &'a str,
    #[serde(rename = "EventBusName")]
    event_bus_name: &'a str,
}

/// A bounded-queue asynchronous transport for serialized telemetry events.
///
/// Enqueue is non-blocking and drops events when the queue is full. A
/// single background worker batches items and flushes them to the
/// configured backend, retrying transient failures with backoff and
/// draining the queue on shutdown.
pub struct Transport {
    sender: mpsc::Sender<String>,
    shutdown: Arc<Notify>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicUsize>,
}

impl Transport {
    /// Spawn the background worker and return a handle to the transport.
    #[must_use]
    pub fn spawn(config: TransportConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_queue_size.max(1));
        let shutdown = Arc::new(Notify::new());
        let dropped = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(config, receiver, shutdown.clone()));

        Self {
            sender,
            shutdown,
            worker: tokio::sync::Mutex::new(Some(worker)),
            dropped,
        }
    }

    /// Serialize `event` and enqueue it without blocking. Drops the event
    /// and logs a warning if the queue is full.
    pub fn send<T: Serialize>(&self, event: &T) {
        let serialized = match serde_json::to_string(event) {
            Ok(s) => s,
            Err(err) => {
                debug!(error = %err, "failed to serialize telemetry event, dropping");
                return;
            }
        };

        if let Err(mpsc::error::TrySendError::Full(_)) = self.sender.try_send(serialized) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("transport queue full, dropping telemetry event");
        }
    }

    /// Number of events dropped due to a full queue, for diagnostics.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signal the worker to stop, wait (bounded) for it to drain the
    /// queue and flush a final batch, then join.
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, handle).await.is_err() {
                error!("transport worker did not shut down within the join timeout");
            }
        }
    }
}

async fn run_worker(config: TransportConfig, mut receiver: mpsc::Receiver<String>, shutdown: Arc<Notify>) {
    let client = reqwest::Client::new();
    let mut batch: Vec<String> = Vec::with_capacity(config.batch_size);

    loop {
        tokio::select! {
            biased;
            () = shutdown.notified() => break,
            res = tokio::time::timeout(config.flush_interval, receiver.recv()) => {
                match res {
                    Ok(Some(item)) => {
                        batch.push(item);
                        if batch.len() >= config.batch_size {
                            flush_with_retry(&client, &config, &mut batch).await;
                        }
                    }
                    Ok(None) => break,
                    Err(_elapsed) => {
                        if !batch.is_empty() {
                            flush_with_retry(&client, &config, &mut batch).await;
                        }
                    }
                }
            }
        }
    }

    while let Ok(item) = receiver.try_recv() {
        batch.push(item);
        if batch.len() >= config.batch_size {
            flush_with_retry(&client, &config, &mut batch).await;
        }
    }
    if !batch.is_empty() {
        flush_with_retry(&client, &config, &mut batch).await;
    }
}

async fn flush_with_retry(client: &reqwest::Client, config: &TransportConfig, batch: &mut Vec<String>) {
    if batch.is_empty() {
        return;
    }

    let events = std::mem::take(batch);
    let count = events.len();

    for attempt in 0..=MAX_RETRIES {
        match flush_once(client, config, &events).await {
            Ok(()) => return,
            Err(FlushError::Permanent { status, body_preview }) => {
                warn!(%status, body = %body_preview, "ingestion rejected batch, not retrying");
                return;
            }
            Err(err) => {
                if attempt == MAX_RETRIES {
                    error!(dropped = count, error = %err, "exhausted retries, dropping batch");
                    return;
                }
                let delay = Duration::from_secs(BACKOFF_SECONDS[attempt as usize]);
                debug!(attempt, ?delay, error = %err, "retrying batch flush");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn flush_once(client: &reqwest::Client, config: &TransportConfig, events: &[String]) -> Result<(), FlushError> {
    match config.mode {
        TransportMode::Http => flush_http(client, config, events).await,
        TransportMode::EventBridge => flush_eventbridge(client, config, events).await,
    }
}

async fn flush_http(client: &reqwest::Client, config: &TransportConfig, events: &[String]) -> Result<(), FlushError> {
    let url = format!("{}/v1/ingest", config.endpoint_url);
    let response = client
        .post(url)
        .bearer_auth(&config.api_key)
        .timeout(INGEST_TIMEOUT)
        .json(&serde_json::json!({ "events": events }))
        .send()
        .await?;

    classify(response).await
}

async fn flush_eventbridge(client: &reqwest::Client, config: &TransportConfig, events: &[String]) -> Result<(), FlushError> {
    let entries: Vec<BusEntry<'_>> = events
        .iter()
        .map(|detail| BusEntry {
            source: "invokelens.sdk",
            detail_type: "InvocationTelemetry",
            detail,
            event_bus_name: &config.event_bus_name,
        })
        .collect();

    let url = format!("{}/v1/ingest-bus", config.endpoint_url);
    let response = client
        .post(url)
        .bearer_auth(&config.api_key)
        .timeout(INGEST_TIMEOUT)
        .json(&serde_json::json!({ "entries": entries }))
        .send()
        .await?;

    classify(response).await
}

async fn classify(response: reqwest::Response) -> Result<(), FlushError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        let body_preview: String = body.chars().take(STATUS_BODY_PREVIEW).collect();
        return Err(FlushError::Permanent { status, body_preview });
    }
    Err(FlushError::Retryable(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: String) -> TransportConfig {
        TransportConfig {
            endpoint_url: endpoint,
            api_key: "secret".to_string(),
            mode: TransportMode::Http,
            event_bus_name: "invokelens-bus".to_string(),
            batch_size: 2,
            flush_interval: Duration::from_millis(50),
            max_queue_size: 16,
        }
    }

    #[tokio::test]
    async fn batch_flushes_once_size_threshold_reached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::spawn(test_config(server.uri()));
        transport.send(&serde_json::json!({"e": 1}));
        transport.send(&serde_json::json!({"e": 2}));
        tokio::time::sleep(Duration::from_millis(200)).await;
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn idle_timer_flushes_partial_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::spawn(test_config(server.uri()));
        transport.send(&serde_json::json!({"e": 1}));
        tokio::time::sleep(Duration::from_millis(200)).await;
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_remaining_queue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.flush_interval = Duration::from_secs(60);
        let transport = Transport::spawn(config);
        transport.send(&serde_json::json!({"e": 1}));
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn no_retry_on_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.flush_interval = Duration::from_secs(60);
        let transport = Transport::spawn(config);
        transport.send(&serde_json::json!({"e": 1}));
        transport.send(&serde_json::json!({"e": 2}));
        tokio::time::sleep(Duration::from_millis(200)).await;
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_increments_dropped_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.max_queue_size = 1;
        config.flush_interval = Duration::from_secs(60);
        let transport = Transport::spawn(config);
        for i in 0..10 {
            transport.send(&serde_json::json!({"e": i}));
        }
        assert!(transport.dropped_count() > 0);
        transport.shutdown().await;
    }
}
