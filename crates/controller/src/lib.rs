// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central controller: watches cluster desired state, compiles per-node
//! cron schedules, broadcasts them to daemons, and fans user operations
//! out to the right nodes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod client;
pub mod env;
pub mod fanout;
pub mod state;
pub mod watcher;

pub use client::{jobs_version, ClientError, DaemonClient, HttpDaemonClient};
pub use fanout::AppController;
pub use state::{ClusterState, SharedState, EXPIRE_SCHEDULE, VOLUME_ROOT};
pub use watcher::{SpecStream, WatchError, WatchEvent, Watcher};
