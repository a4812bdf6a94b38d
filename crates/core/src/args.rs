// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Untyped task argument and result maps with coercing accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type returned by registered task functions.
///
/// Tasks aggregate driver, subprocess, and filesystem failures; the
/// scheduler only needs the message for the job record's `reason`.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Result map a task function hands back (ends up in the job record).
pub type TaskValues = Map<String, Value>;

/// Argument map carried by a job, as declared by the controller.
///
/// Values arrive as arbitrary JSON; accessors coerce them the way the
/// scheduler's callers expect, falling back to the given default on a
/// missing key or an unconvertible value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskArgs(pub Map<String, Value>);

impl TaskArgs {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn str(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    i
                } else if let Some(f) = n.as_f64() {
                    f as i64
                } else {
                    default
                }
            }
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// String-array accessor. Non-string elements are dropped.
    pub fn str_slice(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TaskArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
