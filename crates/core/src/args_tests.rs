// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn args() -> TaskArgs {
    let mut a = TaskArgs::new();
    a.insert("path", "/data/app");
    a.insert("instanceNo", 3);
    a.insert("count", "42");
    a.insert("ratio", 1.9);
    a.insert("containers", json!(["c1", "c2", 7]));
    a
}

#[test]
fn str_returns_default_on_missing_or_wrong_type() {
    let a = args();
    assert_eq!(a.str("path", ""), "/data/app");
    assert_eq!(a.str("missing", "dflt"), "dflt");
    assert_eq!(a.str("instanceNo", "dflt"), "dflt");
}

#[test]
fn int_coerces_numbers_and_decimal_strings() {
    let a = args();
    assert_eq!(a.int("instanceNo", 0), 3);
    assert_eq!(a.int("count", 0), 42);
    assert_eq!(a.int("ratio", 0), 1);
    assert_eq!(a.int("path", 7), 7);
    assert_eq!(a.int("missing", -1), -1);
}

#[test]
fn str_slice_filters_non_strings() {
    let a = args();
    assert_eq!(a.str_slice("containers", &[]), vec!["c1", "c2"]);
    assert_eq!(a.str_slice("missing", &["x"]), vec!["x"]);
}

#[test]
fn serde_is_transparent() {
    let a = args();
    let json = serde_json::to_value(&a).unwrap();
    assert_eq!(json["path"], "/data/app");
    let back: TaskArgs = serde_json::from_value(json).unwrap();
    assert_eq!(back, a);
}
