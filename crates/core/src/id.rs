// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and record identifier schemes.
//!
//! A job id is 40 lowercase hex chars: the owning node's IPv4 octets (8
//! chars) followed by an MD5 fingerprint over the job's schedule, action,
//! and argument values (32 chars). The embedded address lets the
//! controller route per-job operations back to the node that owns it.

use crate::args::TaskArgs;
use crate::clock::Clock;
use md5::{Digest, Md5};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid job id {0:?}")]
    Invalid(String),

    #[error("invalid ipv4 address {0:?}")]
    InvalidAddr(String),
}

/// Build the stable job id for a job owned by `ip`.
///
/// Two jobs on the same node with equal schedule, action, and argument
/// set collide by construction, which makes re-declaration idempotent.
pub fn generate_job_id(ip: &str, spec: &str, action: &str, args: &TaskArgs) -> Result<String, IdError> {
    let addr: Ipv4Addr = ip.parse().map_err(|_| IdError::InvalidAddr(ip.to_string()))?;

    let mut keys: Vec<&String> = args.0.keys().collect();
    keys.sort();
    let values: Vec<String> = keys
        .iter()
        .filter_map(|k| args.0.get(*k))
        .map(render_value)
        .collect();

    let mut hasher = Md5::new();
    hasher.update(format!("{}/{}/[{}]", spec, action, values.join(" ")));
    let sum = hasher.finalize();

    let mut id = String::with_capacity(40);
    for b in addr.octets() {
        id.push_str(&format!("{:02x}", b));
    }
    for b in sum {
        id.push_str(&format!("{:02x}", b));
    }
    Ok(id)
}

// Deterministic rendering of a JSON argument value for fingerprinting:
// strings raw, arrays bracketed and space-joined, the rest compact JSON.
fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", inner.join(" "))
        }
        other => other.to_string(),
    }
}

/// Recover the owning node's dotted-quad address from a job id.
pub fn parse_ip_from_id(id: &str) -> Result<String, IdError> {
    if id.len() < 8 || !id.is_char_boundary(8) {
        return Err(IdError::Invalid(id.to_string()));
    }
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&id[i * 2..i * 2 + 2], 16)
            .map_err(|_| IdError::Invalid(id.to_string()))?;
    }
    Ok(Ipv4Addr::from(octets).to_string())
}

static RID_COUNTER: AtomicU16 = AtomicU16::new(0);

/// Generate a record id: unix seconds concatenated with a counter-salted
/// MD5 digest. The counter wraps; uniqueness only has to hold within a
/// second on one process.
pub fn next_rid(clock: &impl Clock) -> String {
    let salt = RID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Md5::new();
    hasher.update(format!("{}{}", clock.epoch_nanos(), salt));
    let sum = hasher.finalize();
    let mut rid = clock.epoch_secs().to_string();
    for b in sum {
        rid.push_str(&format!("{:02x}", b));
    }
    rid
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
