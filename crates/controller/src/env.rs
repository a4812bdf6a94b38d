// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the controller binary.

use std::path::PathBuf;

/// Discovery service watch URL.
pub fn discovery_url() -> String {
    std::env::var("BAKCTL_DISCOVERY_URL")
        .unwrap_or_else(|_| "http://lainlet.lain:9001/v2/backupspec".to_string())
}

/// Address daemons report records back to.
pub fn advertise_url() -> String {
    std::env::var("BAKCTL_ADVERTISE")
        .unwrap_or_else(|_| "http://127.0.0.1:9002/api/v2/system/notify".to_string())
}

/// Directory the record store keeps its monthly partitions in.
pub fn data_dir() -> PathBuf {
    std::env::var("BAKCTL_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Port daemons listen on.
pub fn daemon_port() -> u16 {
    std::env::var("BAKCTL_DAEMON_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9002)
}
