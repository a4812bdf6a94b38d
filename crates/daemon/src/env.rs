// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;

/// Node address: the job-ID prefix and the storage namespace.
pub fn node_ip() -> String {
    std::env::var("BAKD_NODE_IP").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Root of the shared storage mount the filesystem driver works under.
pub fn driver_root() -> PathBuf {
    std::env::var("BAKD_DRIVER_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/mfs/lain/backup"))
}

/// Optional directory for daily-rotated log files; stderr when unset.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("BAKD_LOG_DIR").ok().map(PathBuf::from)
}
