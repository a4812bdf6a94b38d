// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling unit declared by the controller and executed by a daemon.

use crate::args::TaskArgs;
use crate::id::{generate_job_id, IdError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a job is dispatched: on its cron schedule, or as a one-shot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[default]
    Cron,
    Once,
}

crate::simple_display! {
    JobKind {
        Cron => "cron",
        Once => "once",
    }
}

/// An executable scheduling unit.
///
/// The controller re-declares the full job set on every desired-state
/// change; the stable `id` lets the daemon carry per-job `sleep` state
/// across those swaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Cron expression: five fields, or six with a leading seconds field.
    pub spec: String,
    /// Name of a registered task function.
    pub action: String,
    #[serde(default)]
    pub args: TaskArgs,
    #[serde(rename = "type", default)]
    pub kind: JobKind,
    #[serde(default)]
    pub sleep: bool,
}

impl Job {
    pub fn new(spec: impl Into<String>, action: impl Into<String>, args: TaskArgs) -> Self {
        Self {
            id: String::new(),
            spec: spec.into(),
            action: action.into(),
            args,
            kind: JobKind::Cron,
            sleep: false,
        }
    }

    /// Stamp `id` from the owning node's address and this job's fingerprint.
    pub fn with_generated_id(mut self, ip: &str) -> Result<Self, IdError> {
        self.id = generate_job_id(ip, &self.spec, &self.action, &self.args)?;
        Ok(self)
    }

    /// Query matching for the entries listing.
    ///
    /// Recognized keys: `id`, `type`, `action`, and `args_<k>` (string
    /// equality against `args[k]`). Unknown keys are ignored.
    pub fn matches(&self, query: &HashMap<String, String>) -> bool {
        for (k, v) in query {
            match k.as_str() {
                "id" => {
                    if *v != self.id {
                        return false;
                    }
                }
                "type" => {
                    if *v != self.kind.to_string() {
                        return false;
                    }
                }
                "action" => {
                    if *v != self.action {
                        return false;
                    }
                }
                key if key.starts_with("args_") && key.len() > 5 => {
                    match self.args.get(&key[5..]) {
                        Some(Value::String(s)) if s == v => {}
                        _ => return false,
                    }
                }
                _ => continue,
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
