// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic cron scheduler: registered task functions, a swappable job
//! table, one-second dispatch, once-runs, and record notification.

mod invoke;
mod notify;
mod spec;

pub use notify::{HttpPoster, NotifyError, NotifySinks, RecordPoster};
pub use spec::{parse_spec, SpecError};

#[cfg(test)]
pub(crate) use notify::fake;

use bakd_core::{Clock, Job, JobKind, SystemClock, TaskArgs, TaskError, TaskValues};
use bakd_wire::EntrySpec;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A registered task: argument map in, result map or error out.
pub type TaskFn = Arc<dyn Fn(TaskArgs) -> BoxFuture<'static, Result<TaskValues, TaskError>> + Send + Sync>;

/// Adapt an async closure into a [`TaskFn`].
pub fn task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn(TaskArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TaskValues, TaskError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("function named {0:?} already exists")]
    AlreadyRegistered(String),

    #[error("unknown task name {0:?}")]
    UnknownAction(String),

    #[error("job not found with id {0:?}")]
    JobNotFound(String),

    #[error("job named {0:?} not found")]
    JobNotFoundByAction(String),
}

pub(crate) struct ScheduledJob {
    pub(crate) job: Job,
    schedule: cron::Schedule,
    prev: Option<DateTime<Utc>>,
    next: Option<DateTime<Utc>>,
}

struct EngineState {
    functions: HashMap<String, TaskFn>,
    jobs: Vec<ScheduledJob>,
    version: String,
    started: bool,
}

pub(crate) struct EngineInner<C: Clock> {
    state: Mutex<EngineState>,
    running: Arc<AtomicI64>,
    notify: Arc<NotifySinks>,
    clock: C,
}

/// The scheduler engine. Cheap to clone; all clones share state.
///
/// The single mutex guards the function table, the job table, and the
/// version token; it is never held across job execution.
pub struct Engine<C: Clock = SystemClock> {
    inner: Arc<EngineInner<C>>,
}

impl<C: Clock> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> Engine<C> {
    pub fn new(clock: C, notify: Arc<NotifySinks>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    functions: HashMap::new(),
                    jobs: Vec::new(),
                    version: String::new(),
                    started: false,
                }),
                running: Arc::new(AtomicI64::new(0)),
                notify,
                clock,
            }),
        }
    }

    pub fn register(&self, name: &str, f: TaskFn) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock();
        if state.functions.contains_key(name) {
            return Err(EngineError::AlreadyRegistered(name.to_string()));
        }
        state.functions.insert(name.to_string(), f);
        Ok(())
    }

    /// Idempotent.
    pub fn start(&self) {
        self.inner.state.lock().started = true;
    }

    /// Idempotent. Stops new fires; in-flight invocations keep running.
    pub fn stop(&self) {
        self.inner.state.lock().started = false;
    }

    pub fn status(&self) -> &'static str {
        if self.inner.state.lock().started {
            "started"
        } else {
            "stopped"
        }
    }

    pub fn version(&self) -> String {
        self.inner.state.lock().version.clone()
    }

    pub fn count(&self) -> usize {
        self.inner.state.lock().jobs.len()
    }

    /// In-flight invocations, for graceful shutdown and debug.
    pub fn running_count(&self) -> i64 {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Replace the job table.
    ///
    /// The table swap is not atomic with respect to the ticker, so a job
    /// about to fire could be dropped mid-swap; while any next-fire is
    /// within five seconds the swap waits it out in one-second polls.
    pub async fn update(&self, jobs: Vec<Job>, version: &str) {
        loop {
            let now = self.inner.clock.now_utc();
            let soonest = {
                let state = self.inner.state.lock();
                state.jobs.iter().filter_map(|sj| sj.next).min()
            };
            match soonest {
                Some(next) if next - now < chrono::Duration::seconds(5) => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                _ => break,
            }
        }

        let mut state = self.inner.state.lock();
        state.started = false;

        // Carry each job's sleep flag across the swap, keyed by id.
        let sleep_info: HashMap<String, bool> =
            state.jobs.iter().map(|sj| (sj.job.id.clone(), sj.job.sleep)).collect();

        let now = self.inner.clock.now_utc();
        let mut table = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            if !state.functions.contains_key(&job.action) {
                tracing::warn!(action = %job.action, "unknown function, skipping job");
                continue;
            }
            job.kind = JobKind::Cron;
            job.sleep = sleep_info.get(&job.id).copied().unwrap_or(false);
            match spec::parse_spec(&job.spec) {
                Ok(schedule) => {
                    let next = schedule.after(&now).next();
                    table.push(ScheduledJob { job, schedule, prev: None, next });
                }
                Err(e) => tracing::warn!(spec = %job.spec, error = %e, "fail to add job"),
            }
        }
        state.jobs = table;
        state.version = version.to_string();
        state.started = true;
    }

    /// Fire every due entry. Returns how many fired.
    ///
    /// Invocations run on their own tasks; the engine lock is released
    /// before any of them starts.
    pub fn tick(&self) -> usize {
        let now = self.inner.clock.now_utc();
        let mut due = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if !state.started {
                return 0;
            }
            for sj in &mut state.jobs {
                if let Some(next) = sj.next {
                    if next <= now {
                        sj.prev = Some(next);
                        sj.next = sj.schedule.after(&now).next();
                        due.push(sj.job.clone());
                    }
                }
            }
        }
        let fired = due.len();
        for job in due {
            let _ = invoke::spawn(Arc::clone(&self.inner), job, None);
        }
        fired
    }

    /// Drive [`Engine::tick`] at one-second resolution.
    pub fn spawn_ticker(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                engine.tick();
            }
        })
    }

    pub fn entries(&self, query: &HashMap<String, String>) -> Vec<EntrySpec> {
        let state = self.inner.state.lock();
        state
            .jobs
            .iter()
            .filter(|sj| sj.job.matches(query))
            .map(|sj| EntrySpec { prev: sj.prev, next: sj.next, job: sj.job.clone() })
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Result<Job, EngineError> {
        let state = self.inner.state.lock();
        state
            .jobs
            .iter()
            .find(|sj| sj.job.id == id)
            .map(|sj| sj.job.clone())
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))
    }

    /// First job whose action matches and whose args contain every
    /// key/value pair of the query.
    pub fn find(&self, action: &str, args: &TaskArgs) -> Result<Job, EngineError> {
        let state = self.inner.state.lock();
        state
            .jobs
            .iter()
            .filter(|sj| sj.job.action == action)
            .find(|sj| args.0.iter().all(|(k, v)| sj.job.args.get(k) == Some(v)))
            .map(|sj| sj.job.clone())
            .ok_or_else(|| EngineError::JobNotFoundByAction(action.to_string()))
    }

    /// Fire a clone of the job once, asynchronously. Ignores `sleep`.
    pub fn once(&self, job: &Job) -> String {
        let mut clone = job.clone();
        clone.kind = JobKind::Once;
        let rid = bakd_core::next_rid(&self.inner.clock);
        let _ = invoke::spawn(Arc::clone(&self.inner), clone, Some(rid.clone()));
        rid
    }

    /// Synthesize a once-job for a registered action and fire it.
    pub fn raw_once(&self, action: &str, args: TaskArgs) -> Result<String, EngineError> {
        if !self.inner.state.lock().functions.contains_key(action) {
            return Err(EngineError::UnknownAction(action.to_string()));
        }
        let mut job = Job::new(String::new(), action, args);
        job.kind = JobKind::Once;
        let rid = bakd_core::next_rid(&self.inner.clock);
        let _ = invoke::spawn(Arc::clone(&self.inner), job, Some(rid.clone()));
        Ok(rid)
    }

    /// Flip a job's sleep flag. Missing ids only warn.
    pub fn sleep(&self, id: &str, sleep: bool) {
        let mut state = self.inner.state.lock();
        match state.jobs.iter_mut().find(|sj| sj.job.id == id) {
            Some(sj) => sj.job.sleep = sleep,
            None => tracing::warn!(id, "unknown job id"),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
