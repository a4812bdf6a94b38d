// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state watch loop, drift broadcast, and liveness re-sync.

use crate::client::DaemonClient;
use crate::state::{CoreInfo, SharedState};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch connect failed: {0}")]
    Connect(String),
}

/// One event off the discovery stream.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub event: String,
    pub data: Vec<u8>,
}

impl WatchEvent {
    /// Heartbeats and empty payloads carry no snapshot.
    pub fn is_noop(&self) -> bool {
        self.event == "heartbeat" || self.data.is_empty()
    }
}

/// The long-lived change stream of per-application backup declarations.
/// Only the data shape is fixed here; the transport behind it is the
/// deployment's concern.
#[async_trait]
pub trait SpecStream: Send + Sync + 'static {
    async fn watch(&self) -> Result<BoxStream<'static, WatchEvent>, WatchError>;
}

/// Consumes snapshots, reconciles per-node job tables, and pushes
/// updates to daemons.
pub struct Watcher<S: SpecStream, D: DaemonClient> {
    stream: S,
    client: Arc<D>,
    state: SharedState,
    /// URL daemons report job records back to.
    advertise: String,
    reconnect_delay: Duration,
    liveness_interval: Duration,
}

impl<S: SpecStream, D: DaemonClient> Watcher<S, D> {
    pub fn new(stream: S, client: Arc<D>, state: SharedState, advertise: impl Into<String>) -> Self {
        Self {
            stream,
            client,
            state,
            advertise: advertise.into(),
            reconnect_delay: Duration::from_secs(3),
            liveness_interval: Duration::from_secs(30),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_intervals(mut self, reconnect: Duration, liveness: Duration) -> Self {
        self.reconnect_delay = reconnect;
        self.liveness_interval = liveness;
        self
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Watch loop: ingest snapshots until the stream ends or breaks,
    /// then reconnect after a short delay, forever.
    pub async fn run(&self) {
        loop {
            let mut events = match self.stream.watch().await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "fail to watch, retry after delay");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            tracing::info!("start to watch backup specs");
            while let Some(event) = events.next().await {
                if event.is_noop() {
                    continue;
                }
                match self.ingest(&event.data) {
                    Ok(dirty) => {
                        tracing::debug!(?dirty, "job changed nodes");
                        self.broadcast(&dirty).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "fail to unmarshal watch data");
                        break;
                    }
                }
            }
            tracing::warn!("watch channel closed, retry after delay");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Decode one snapshot payload and apply it. Returns dirty nodes.
    pub fn ingest(&self, data: &[u8]) -> Result<Vec<String>, serde_json::Error> {
        let info: CoreInfo = serde_json::from_slice(data)?;
        tracing::info!(procs = info.len(), "got app data from discovery");
        Ok(self.state.write().apply_snapshot(info))
    }

    /// Push job lists and the notify address to the given nodes.
    /// Per-node failures are logged; the rest of the cycle continues.
    pub async fn broadcast(&self, nodes: &[String]) {
        for node in nodes {
            let jobs = self.state.read().jobs_for(node);
            if let Err(e) = self.client.set_cron_jobs(node, &jobs).await {
                tracing::error!(%node, error = %e, "fail to update cron jobs");
            }
            if let Err(e) = self.client.set_notify(node, &self.advertise).await {
                tracing::error!(%node, error = %e, "fail to set the notify address");
            }
        }
    }

    /// Liveness poll: a daemon reporting a zero-value update time lost
    /// its job table (restart); re-broadcast it.
    pub async fn run_liveness(&self) {
        loop {
            let nodes = self.state.read().known_nodes();
            for node in nodes {
                match self.client.debug(&node).await {
                    Ok(debug) if debug.update_time.starts_with('0') => {
                        tracing::info!(%node, "daemon has no jobs, update it");
                        self.broadcast(std::slice::from_ref(&node)).await;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(%node, error = %e, "liveness poll failed"),
                }
            }
            tokio::time::sleep(self.liveness_interval).await;
        }
    }
}

/// Server-sent-events reader for streams shaped like the discovery
/// service's `/v2/backupspec` long-poll: `event:` and `data:` lines
/// separated by blank lines.
pub struct SseSpecStream {
    url: String,
    client: reqwest::Client,
}

impl SseSpecStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl SpecStream for SseSpecStream {
    async fn watch(&self) -> Result<BoxStream<'static, WatchEvent>, WatchError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WatchError::Connect(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(WatchError::Connect(format!("server returned {}", resp.status())));
        }

        let stream = resp
            .bytes_stream()
            .scan((Vec::new(), SseFrame::default()), |(buf, frame), chunk| {
                let mut out = Vec::new();
                if let Ok(bytes) = chunk {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        if let Some(event) = frame.feed(&line) {
                            out.push(event);
                        }
                    }
                }
                futures_util::future::ready(Some(out))
            })
            .flat_map(futures_util::stream::iter);
        Ok(stream.boxed())
    }
}

/// Accumulates `event:`/`data:` lines into events at blank lines.
#[derive(Default)]
struct SseFrame {
    event: String,
    data: Vec<u8>,
}

impl SseFrame {
    fn feed(&mut self, line: &[u8]) -> Option<WatchEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            if self.event.is_empty() && self.data.is_empty() {
                return None;
            }
            let event = WatchEvent {
                event: std::mem::take(&mut self.event),
                data: std::mem::take(&mut self.data),
            };
            return Some(event);
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push(b'\n');
            }
            self.data.extend_from_slice(rest.trim_start().as_bytes());
        }
        None
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Scripted spec stream for tests.

    use super::{SpecStream, WatchError, WatchEvent};
    use async_trait::async_trait;
    use futures_util::stream::BoxStream;
    use futures_util::StreamExt;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream_adapter::ReceiverStream;

    mod tokio_stream_adapter {
        use futures_util::Stream;
        use std::pin::Pin;
        use std::task::{Context, Poll};
        use tokio::sync::mpsc::Receiver;

        /// Minimal mpsc-receiver stream, enough for test scripting.
        pub struct ReceiverStream<T>(pub Receiver<T>);

        impl<T> Stream for ReceiverStream<T> {
            type Item = T;

            fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
                self.0.poll_recv(cx)
            }
        }
    }

    /// Hands out one scripted channel per `watch()` call.
    pub struct FakeSpecStream {
        senders: Mutex<Vec<mpsc::Sender<WatchEvent>>>,
    }

    impl FakeSpecStream {
        pub fn new() -> std::sync::Arc<Self> {
            std::sync::Arc::new(Self { senders: Mutex::new(Vec::new()) })
        }

        /// Push an event into the most recent watch connection, waiting
        /// briefly for one to open if the watcher has not connected yet.
        pub async fn emit(&self, event: WatchEvent) {
            for _ in 0..1000 {
                let sender = self.senders.lock().last().cloned();
                if let Some(sender) = sender {
                    let _ = sender.send(event).await;
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        }
    }

    #[async_trait]
    impl SpecStream for std::sync::Arc<FakeSpecStream> {
        async fn watch(&self) -> Result<BoxStream<'static, WatchEvent>, WatchError> {
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().push(tx);
            Ok(ReceiverStream(rx).boxed())
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
