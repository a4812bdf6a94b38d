// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn job() -> Job {
    let args: TaskArgs = [("path", "/data/app"), ("app", "hello")].into_iter().collect();
    Job::new("0 0 * * *", "backup", args).with_generated_id("10.0.0.1").unwrap()
}

fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn empty_query_matches() {
    assert!(job().matches(&HashMap::new()));
}

#[test]
fn matches_by_id_type_action() {
    let j = job();
    assert!(j.matches(&query(&[("id", &j.id)])));
    assert!(j.matches(&query(&[("type", "cron")])));
    assert!(!j.matches(&query(&[("type", "once")])));
    assert!(j.matches(&query(&[("action", "backup")])));
    assert!(!j.matches(&query(&[("action", "backup_expire")])));
}

#[test]
fn matches_by_args_prefix() {
    let j = job();
    assert!(j.matches(&query(&[("args_app", "hello")])));
    assert!(!j.matches(&query(&[("args_app", "other")])));
    assert!(!j.matches(&query(&[("args_missing", "x")])));
}

#[test]
fn unknown_keys_are_ignored() {
    let j = job();
    assert!(j.matches(&query(&[("whatever", "x"), ("args_app", "hello")])));
}

#[test]
fn kind_serializes_as_type() {
    let j = job();
    let json = serde_json::to_value(&j).unwrap();
    assert_eq!(json["type"], "cron");
    assert_eq!(json["spec"], "0 0 * * *");
    let back: Job = serde_json::from_value(json).unwrap();
    assert_eq!(back, j);
}

#[test]
fn kind_defaults_to_cron_when_absent() {
    let j: Job = serde_json::from_str(r#"{"id":"","spec":"* * * * *","action":"backup"}"#).unwrap();
    assert_eq!(j.kind, JobKind::Cron);
    assert!(!j.sleep);
    assert!(j.args.is_empty());
}
