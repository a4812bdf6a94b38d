// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression handling.
//!
//! The controller emits five-field expressions; six fields with a
//! leading seconds column are accepted too. The underlying parser always
//! wants a seconds column, so five-field input gets `0` prepended.

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("cron spec {spec:?} must have 5 or 6 fields, got {fields}")]
    FieldCount { spec: String, fields: usize },

    #[error("invalid cron spec {spec:?}: {detail}")]
    Parse { spec: String, detail: String },
}

pub fn parse_spec(spec: &str) -> Result<cron::Schedule, SpecError> {
    let trimmed = spec.trim();
    let fields = trimmed.split_whitespace().count();
    let normalized = match fields {
        5 => format!("0 {}", trimmed),
        6 => trimmed.to_string(),
        _ => return Err(SpecError::FieldCount { spec: spec.to_string(), fields }),
    };
    cron::Schedule::from_str(&normalized)
        .map_err(|e| SpecError::Parse { spec: spec.to_string(), detail: e.to_string() })
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
