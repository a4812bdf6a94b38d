// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bakd_core::test_support::sample_job;
use bakd_core::JobRecord;
use chrono::TimeZone;
use tempfile::TempDir;

fn record(rid: &str, state: RecordState) -> JobRecord {
    let start = Utc.with_ymd_and_hms(2024, 3, 15, 4, 0, 0).single().unwrap();
    let mut r = JobRecord::started(sample_job("10.0.0.1", "/data/app"), rid.into(), start);
    if state != RecordState::Running {
        r.finish(state, start + chrono::Duration::seconds(30), "");
    }
    r
}

fn store() -> (TempDir, RecordStore) {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::new(dir.path().join("data")).unwrap();
    (dir, store)
}

#[test]
fn put_then_get_newest_first() {
    let (_dir, store) = store();
    for i in 0..5 {
        store.put("app", &record(&format!("171047520{}aa", i), RecordState::Success)).unwrap();
    }
    let got = store.get("app", 3, 3, 2024).unwrap();
    assert_eq!(got.len(), 3);
    assert_eq!(got[0].rid, "1710475204aa");
    assert_eq!(got[2].rid, "1710475202aa");
}

#[test]
fn get_missing_partition_returns_empty() {
    let (_dir, store) = store();
    assert!(store.get("app", 10, 1, 2019).unwrap().is_empty());
}

#[test]
fn get_missing_app_table_returns_empty() {
    let (_dir, store) = store();
    store.put("app", &record("1710475200aa", RecordState::Success)).unwrap();
    assert!(store.get("other", 10, 3, 2024).unwrap().is_empty());
}

#[test]
fn put_rejects_empty_rid_and_zero_start() {
    let (_dir, store) = store();
    let mut r = record("", RecordState::Running);
    assert!(matches!(store.put("app", &r).unwrap_err(), RecordError::EmptyRid));

    r.rid = "x".into();
    r.start = Utc.timestamp_opt(0, 0).single().unwrap();
    assert!(matches!(store.put("app", &r).unwrap_err(), RecordError::ZeroStart));
}

#[test]
fn stale_running_never_overwrites_terminal() {
    let (_dir, store) = store();
    store.put("app", &record("1710475200aa", RecordState::Success)).unwrap();
    store.put("app", &record("1710475200aa", RecordState::Running)).unwrap();

    let got = store.get("app", 10, 3, 2024).unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].state, RecordState::Success);
}

#[test]
fn terminal_update_replaces_running() {
    let (_dir, store) = store();
    store.put("app", &record("1710475200aa", RecordState::Running)).unwrap();
    store.put("app", &record("1710475200aa", RecordState::Failed)).unwrap();

    let got = store.get("app", 10, 3, 2024).unwrap();
    assert_eq!(got[0].state, RecordState::Failed);
}

#[test]
fn get_by_id_scans_opened_partitions_only() {
    let (dir, _) = store();
    {
        let warm = RecordStore::new(dir.path().join("data")).unwrap();
        warm.put("app", &record("1710475200aa", RecordState::Success)).unwrap();
    }
    // A fresh store has the partition file on disk but not opened.
    let cold = RecordStore::new(dir.path().join("data")).unwrap();
    assert!(matches!(
        cold.get_by_id("app", "1710475200aa").unwrap_err(),
        RecordError::NotFound
    ));

    // Reading the month opens the partition and makes the id visible.
    cold.get("app", 1, 3, 2024).unwrap();
    let found = cold.get_by_id("app", "1710475200aa").unwrap();
    assert_eq!(found.state, RecordState::Success);
}

#[test]
fn backup_copies_partition_files() {
    let (dir, store) = store();
    store.put("app", &record("1710475200aa", RecordState::Success)).unwrap();

    let dest = dir.path().join("copied");
    store.backup(&dest).unwrap();
    assert!(dest.join("records202403.db").exists());

    // The copy is a readable partition.
    let restored = RecordStore::new(&dest).unwrap();
    assert_eq!(restored.get("app", 10, 3, 2024).unwrap().len(), 1);
}

#[test]
fn release_closes_partitions() {
    let (_dir, store) = store();
    store.put("app", &record("1710475200aa", RecordState::Success)).unwrap();
    store.release();
    assert!(matches!(
        store.get_by_id("app", "1710475200aa").unwrap_err(),
        RecordError::NotFound
    ));
}

#[test]
fn partition_names_parse_strictly() {
    assert_eq!(parse_partition_name("records202403.db"), Some(202403));
    assert_eq!(parse_partition_name("records2024.db"), None);
    assert_eq!(parse_partition_name("other202403.db"), None);
    assert_eq!(parse_partition_name("records202403.bak"), None);
}
