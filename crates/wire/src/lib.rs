// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data shapes of the thin RPC surface between controller and daemons.
//!
//! The HTTP transport and routing live outside this workspace; these are
//! the payloads both ends agree on.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod types;

pub use types::{DebugInfo, EntrySpec, FInfo, JobsUpdate, OnceReply, RecoverRequest};
