// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bakd_core::test_support::sample_job;

#[test]
fn jobs_update_version_defaults_empty() {
    let parsed: JobsUpdate = serde_json::from_str(r#"{"data":[]}"#).unwrap();
    assert!(parsed.version.is_empty());
    assert!(parsed.data.is_empty());
}

#[test]
fn entry_spec_round_trips() {
    let entry = EntrySpec {
        prev: None,
        next: Some(chrono::Utc::now()),
        job: sample_job("10.0.0.1", "/data/app"),
    };
    let json = serde_json::to_string(&entry).unwrap();
    let back: EntrySpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn recover_request_uses_wire_names() {
    let parsed: RecoverRequest = serde_json::from_str(
        r#"{"backup":"a-1.tar.gz","destDir":"/data/other","namespace":"10.0.0.2"}"#,
    )
    .unwrap();
    assert_eq!(parsed.dest_dir, "/data/other");
    assert_eq!(parsed.namespace, "10.0.0.2");
    assert!(parsed.files.is_empty());
}
