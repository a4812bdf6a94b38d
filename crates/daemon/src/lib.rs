// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node backup daemon: cron scheduler engine, backup executor, and
//! the typed handlers behind the daemon's RPC surface.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod backup;
pub mod engine;
pub mod env;

use bakd_core::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Process-wide daemon state, passed by reference instead of living in
/// globals.
pub struct DaemonContext<C: Clock = SystemClock> {
    pub engine: engine::Engine<C>,
    pub backup: Arc<backup::BackupContext<C>>,
    pub notify: Arc<engine::NotifySinks>,
    pub started_at: DateTime<Utc>,
    updated_at: Mutex<Option<DateTime<Utc>>>,
    clock: C,
}

impl<C: Clock> DaemonContext<C> {
    pub fn new(
        engine: engine::Engine<C>,
        backup: Arc<backup::BackupContext<C>>,
        notify: Arc<engine::NotifySinks>,
        clock: C,
    ) -> Self {
        Self {
            engine,
            backup,
            notify,
            started_at: clock.now_utc(),
            updated_at: Mutex::new(None),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn mark_updated(&self) {
        *self.updated_at.lock() = Some(self.clock.now_utc());
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        *self.updated_at.lock()
    }
}
