// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bakd_core::Job;
use bakd_storage::FileInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scheduler entry: the job plus its previous and next fire times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub prev: Option<DateTime<Utc>>,
    pub next: Option<DateTime<Utc>>,
    pub job: Job,
}

/// Replace-the-job-set payload. `version` is the MD5 of the serialized
/// list; a daemon seeing its current version treats the call as a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsUpdate {
    pub data: Vec<Job>,
    #[serde(default)]
    pub version: String,
}

/// Reply to a once-run trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnceReply {
    pub rid: String,
}

/// File listing entry under a backup directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FInfo {
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub dir: bool,
}

impl From<FileInfo> for FInfo {
    fn from(info: FileInfo) -> Self {
        Self {
            name: info.name,
            size: info.size,
            mod_time: info.modified,
            dir: info.is_dir,
        }
    }
}

/// Recover operation parameters, for both full archives and incremental
/// directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoverRequest {
    /// Source node's namespace; differs from the target's on migration.
    #[serde(default)]
    pub namespace: String,
    /// Backup name (archive file, or increment directory).
    pub backup: String,
    /// Incremental only: files to restore; `["*"]` means everything.
    #[serde(default)]
    pub files: Vec<String>,
    /// Optional override of the entity's source directory.
    #[serde(default, rename = "destDir")]
    pub dest_dir: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub proc: String,
}

/// Daemon health snapshot for the controller's liveness poll.
///
/// `update_time` is rendered as a string; a daemon that has never had a
/// job table pushed reports a zero-value starting with `'0'`, which the
/// controller uses to force a re-broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "updateTime")]
    pub update_time: String,
    pub crond_status: String,
    pub running_tasks: i64,
    pub job_count: usize,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
