// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    minutes = { "30m", 30 * 60 },
    hours = { "12h", 12 * 60 * 60 },
    days = { "7d", 7 * 24 * 60 * 60 },
    huge = { "10000d", 10000 * 24 * 60 * 60 },
)]
fn parses_valid_settings(input: &str, secs: u64) {
    assert_eq!(parse_expire(input), Ok(Duration::from_secs(secs)));
}

#[parameterized(
    empty = { "" },
    bare_unit = { "d" },
    unknown_unit = { "5w" },
    negative = { "-5d" },
    not_a_number = { "xd" },
)]
fn rejects_invalid_settings(input: &str) {
    assert!(parse_expire(input).is_err());
}

#[test]
fn unknown_unit_error_names_the_unit() {
    assert_eq!(parse_expire("5w"), Err(ExpireParseError::UnknownUnit('w')));
}
