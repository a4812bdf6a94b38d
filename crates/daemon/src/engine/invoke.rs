// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wrapper every invocation runs inside: record emission, running
//! count, and panic capture.

use super::EngineInner;
use bakd_core::{next_rid, Clock, Job, JobKind, JobRecord, RecordState, TaskValues};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

struct RunningGuard(Arc<AtomicI64>);

impl RunningGuard {
    fn new(counter: Arc<AtomicI64>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fire one invocation on its own task.
///
/// Cron fires synthesize a fresh rid; once-runs use the caller's.
pub(crate) fn spawn<C: Clock>(
    inner: Arc<EngineInner<C>>,
    job: Job,
    rid: Option<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(inner, job, rid))
}

async fn run<C: Clock>(inner: Arc<EngineInner<C>>, job: Job, rid: Option<String>) {
    if job.kind == JobKind::Cron && job.sleep {
        return;
    }
    let _running = RunningGuard::new(Arc::clone(&inner.running));

    let rid = rid.unwrap_or_else(|| next_rid(&inner.clock));
    let mut record = JobRecord::started(job.clone(), rid, inner.clock.now_utc());
    inner.notify.publish(&record);

    let func = inner.state.lock().functions.get(&job.action).cloned();
    let outcome: Result<TaskValues, String> = match func {
        None => Err(format!("unknown task name {:?}", job.action)),
        Some(f) => {
            let args = job.args.clone();
            // A nested task so a panicking function surfaces as a join
            // error instead of tearing down the invocation wrapper.
            match tokio::spawn(async move { f(args).await }).await {
                Ok(Ok(values)) => Ok(values),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join) => Err(panic_reason(join)),
            }
        }
    };

    let end = inner.clock.now_utc();
    match outcome {
        Ok(values) => {
            record.result = if values.is_empty() { None } else { Some(values) };
            record.finish(RecordState::Success, end, "");
        }
        Err(reason) => {
            tracing::warn!(action = %job.action, %reason, "task run failed");
            record.finish(RecordState::Failed, end, reason);
        }
    }
    inner.notify.publish(&record);
}

fn panic_reason(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        }
    } else {
        err.to_string()
    }
}
