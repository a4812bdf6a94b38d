// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expire-duration grammar: an integer followed by `m`, `h`, or `d`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpireParseError {
    #[error("empty expire string")]
    Empty,

    #[error("invalid expire number in {0:?}")]
    BadNumber(String),

    #[error("unknown expire unit {0:?}")]
    UnknownUnit(char),
}

/// Parse an expire setting like `30m`, `12h`, or `7d`.
///
/// Unknown units are rejected outright; callers treat the entry as
/// invalid rather than falling back to a default.
pub fn parse_expire(s: &str) -> Result<Duration, ExpireParseError> {
    if s.is_empty() {
        return Err(ExpireParseError::Empty);
    }
    let (num, unit) = s.split_at(s.len() - 1);
    let unit = unit.chars().next().ok_or(ExpireParseError::Empty)?;
    let n: u64 = num.parse().map_err(|_| ExpireParseError::BadNumber(s.to_string()))?;
    let base = match unit {
        'm' => Duration::from_secs(60),
        'h' => Duration::from_secs(60 * 60),
        'd' => Duration::from_secs(24 * 60 * 60),
        other => return Err(ExpireParseError::UnknownUnit(other)),
    };
    Ok(base * n.try_into().unwrap_or(u32::MAX))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
