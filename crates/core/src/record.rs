// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One invocation instance of a job.

use crate::args::TaskValues;
use crate::job::Job;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of a record: created `Running`, finalized exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Running,
    Success,
    Failed,
}

crate::simple_display! {
    RecordState {
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

impl RecordState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordState::Success | RecordState::Failed)
    }
}

/// A job invocation record, emitted to notify sinks on start and on
/// completion and persisted by the controller's record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: Job,
    #[serde(rename = "rid")]
    pub rid: String,
    #[serde(default)]
    pub result: Option<TaskValues>,
    pub state: RecordState,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
}

impl JobRecord {
    /// Fresh record in `running` state for an invocation starting now.
    pub fn started(job: Job, rid: String, start: DateTime<Utc>) -> Self {
        Self {
            job,
            rid,
            result: None,
            state: RecordState::Running,
            start,
            end: None,
            reason: String::new(),
        }
    }

    /// Finalize into a terminal state.
    pub fn finish(&mut self, state: RecordState, end: DateTime<Utc>, reason: impl Into<String>) {
        self.state = state;
        self.end = Some(end);
        self.reason = reason.into();
    }

    /// Record query matching: `rid` and `state` on the record itself,
    /// everything else delegated to the embedded job.
    pub fn matches(&self, query: &HashMap<String, String>) -> bool {
        if let Some(rid) = query.get("rid") {
            if *rid != self.rid {
                return false;
            }
        }
        if let Some(state) = query.get("state") {
            if *state != self.state.to_string() {
                return false;
            }
        }
        self.job.matches(query)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
