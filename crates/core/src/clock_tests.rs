// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

#[test]
fn fake_clock_is_deterministic() {
    let c1 = FakeClock::new();
    let c2 = FakeClock::new();
    assert_eq!(c1.now_utc(), c2.now_utc());
}

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let before = clock.now_utc();
    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now_utc() - before, Duration::seconds(90));
}

#[test]
fn epoch_secs_tracks_now() {
    let clock = FakeClock::new();
    assert_eq!(clock.epoch_secs(), clock.now_utc().timestamp());
    clock.advance(Duration::seconds(5));
    assert_eq!(clock.epoch_secs(), clock.now_utc().timestamp());
}

#[test]
fn system_clock_is_sane() {
    // Any date after 2024 is fine; we only care it is not zero-valued.
    assert!(SystemClock.epoch_secs() > 1_700_000_000);
}
