// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of job records to registered notify sinks.

use async_trait::async_trait;
use bakd_core::JobRecord;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("post to {addr} failed: {detail}")]
    Post { addr: String, detail: String },
}

/// Delivers one record to one sink address.
#[async_trait]
pub trait RecordPoster: Send + Sync + 'static {
    async fn post(&self, addr: &str, record: &JobRecord) -> Result<(), NotifyError>;
}

/// JSON POST over HTTP. A 5xx response counts as a failed attempt.
pub struct HttpPoster {
    client: reqwest::Client,
}

impl HttpPoster {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordPoster for HttpPoster {
    async fn post(&self, addr: &str, record: &JobRecord) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(addr)
            .json(record)
            .send()
            .await
            .map_err(|e| NotifyError::Post { addr: addr.to_string(), detail: e.to_string() })?;
        if resp.status().as_u16() >= 500 {
            return Err(NotifyError::Post {
                addr: addr.to_string(),
                detail: format!("server returned {}", resp.status()),
            });
        }
        Ok(())
    }
}

/// The registered sink addresses plus the delivery policy: every record
/// goes to every sink, up to three attempts spaced one minute apart.
pub struct NotifySinks {
    addrs: RwLock<Vec<String>>,
    poster: Arc<dyn RecordPoster>,
}

impl NotifySinks {
    pub fn new(poster: Arc<dyn RecordPoster>) -> Arc<Self> {
        Arc::new(Self { addrs: RwLock::new(Vec::new()), poster })
    }

    /// Register a sink; duplicates are ignored.
    pub fn add(&self, addr: &str) {
        let mut addrs = self.addrs.write();
        if !addrs.iter().any(|a| a == addr) {
            addrs.push(addr.to_string());
        }
    }

    pub fn remove(&self, addr: &str) {
        self.addrs.write().retain(|a| a != addr);
    }

    pub fn list(&self) -> Vec<String> {
        self.addrs.read().clone()
    }

    /// Deliver asynchronously to every sink. Never blocks the caller.
    pub fn publish(&self, record: &JobRecord) {
        let addrs = self.addrs.read().clone();
        if addrs.is_empty() {
            tracing::debug!("notify address is empty, ignore");
            return;
        }
        for addr in addrs {
            if addr.is_empty() {
                continue;
            }
            let poster = Arc::clone(&self.poster);
            let record = record.clone();
            let _ = tokio::spawn(async move {
                deliver(poster, addr, record).await;
            });
        }
    }
}

async fn deliver(poster: Arc<dyn RecordPoster>, addr: String, record: JobRecord) {
    for attempt in 0..ATTEMPTS {
        match poster.post(&addr, &record).await {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!(rid = %record.rid, attempt, error = %e, "fail to notify record");
            }
        }
        if attempt + 1 < ATTEMPTS {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{NotifyError, RecordPoster};
    use async_trait::async_trait;
    use bakd_core::{JobRecord, RecordState};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// One recorded delivery attempt.
    #[derive(Debug, Clone)]
    pub(crate) struct PostCall {
        pub addr: String,
        pub rid: String,
        pub state: RecordState,
        pub at: tokio::time::Instant,
    }

    /// Poster that records every attempt and can fail the first N.
    pub(crate) struct FakePoster {
        pub calls: Mutex<Vec<PostCall>>,
        fail_first: AtomicUsize,
    }

    impl FakePoster {
        pub fn new() -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), fail_first: AtomicUsize::new(0) })
        }

        pub fn failing_first(n: usize) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), fail_first: AtomicUsize::new(n) })
        }

        pub fn count(&self) -> usize {
            self.calls.lock().len()
        }

        pub fn states_for(&self, rid: &str) -> Vec<RecordState> {
            self.calls.lock().iter().filter(|c| c.rid == rid).map(|c| c.state).collect()
        }
    }

    #[async_trait]
    impl RecordPoster for FakePoster {
        async fn post(&self, addr: &str, record: &JobRecord) -> Result<(), NotifyError> {
            self.calls.lock().push(PostCall {
                addr: addr.to_string(),
                rid: record.rid.clone(),
                state: record.state,
                at: tokio::time::Instant::now(),
            });
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(NotifyError::Post {
                    addr: addr.to_string(),
                    detail: "server returned 500".into(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
