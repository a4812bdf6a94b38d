// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One materialized backup in shared storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full archives are timestamped tarballs; increments are rsync'd
/// directories replaced in place on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    #[default]
    Full,
    Increment,
}

crate::simple_display! {
    BackupMode {
        Full => "full",
        Increment => "increment",
    }
}

/// Default archive base name for a source directory.
pub fn archive_name(source: &str) -> String {
    source.replace('/', "_")
}

/// Suffix of the Meta key holding a source's incremental entity.
pub const INCREMENT_SUFFIX: &str = "@increment";

/// Catalogue entry for one backup, as stored in the per-namespace Meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntity {
    pub mode: BackupMode,
    /// Absolute directory that was backed up.
    pub source: String,
    /// Logical in-container path of the volume.
    pub volume: String,
    /// Full mode: `<archive>-<unix>.tar.gz`; increment mode: `<archive>`.
    pub name: String,
    /// Owning node's address.
    pub server: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub containers: Vec<String>,
    #[serde(rename = "instanceNo")]
    pub instance_no: i64,
}

impl BackupEntity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: &str,
        archive: &str,
        instance_no: i64,
        containers: Vec<String>,
        volume: &str,
        mode: BackupMode,
        server: &str,
        created: DateTime<Utc>,
    ) -> Self {
        let archive = if archive.is_empty() { archive_name(source) } else { archive.to_string() };
        let name = match mode {
            BackupMode::Full => format!("{}-{}.tar.gz", archive, created.timestamp()),
            // A directory in shared storage, not a tar file.
            BackupMode::Increment => archive,
        };
        Self {
            mode,
            source: source.to_string(),
            volume: volume.to_string(),
            name,
            server: server.to_string(),
            size: 0,
            created,
            containers,
            instance_no,
        }
    }

    /// Parent directory the archive pipeline runs in.
    pub fn work_dir(&self) -> String {
        match self.source.trim_end_matches('/').rfind('/') {
            Some(0) => "/".to_string(),
            Some(idx) => self.source[..idx].to_string(),
            None => ".".to_string(),
        }
    }

    /// Final path component of the source directory.
    pub fn base_name(&self) -> &str {
        self.source.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.source)
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
