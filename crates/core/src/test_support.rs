// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and proptest strategies for other crates' tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use crate::{BackupEntity, BackupMode, Job, TaskArgs};
use chrono::{TimeZone, Utc};

/// A backup job the controller would emit, with a generated id.
pub fn sample_job(ip: &str, path: &str) -> Job {
    let args: TaskArgs = [
        ("path", path),
        ("archive", "app-app.web.web-1-data"),
        ("app", "app"),
        ("proc", "app.web.web"),
        ("volume", "/data"),
        ("mode", "full"),
    ]
    .into_iter()
    .collect();
    match Job::new("0 0 * * *", "backup", args).with_generated_id(ip) {
        Ok(job) => job,
        Err(e) => panic!("sample job id generation failed: {e}"),
    }
}

/// A full-mode entity created at a fixed instant.
pub fn sample_entity(source: &str) -> BackupEntity {
    let created = Utc.with_ymd_and_hms(2024, 3, 15, 4, 0, 0).single().unwrap();
    BackupEntity::new(source, "", 1, vec!["cid0".into()], "/data", BackupMode::Full, "10.0.0.1", created)
}

#[cfg(any(test, feature = "proptest"))]
pub mod strategies {
    use proptest::prelude::*;

    /// Any well-formed dotted-quad IPv4 address.
    pub fn ipv4() -> impl Strategy<Value = String> {
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
    }
}
