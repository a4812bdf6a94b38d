// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage backend capability set.
//!
//! All paths handed to a driver are relative to a driver-internal root;
//! the per-node namespace (the node's IPv4) is the first path component.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Error)]
pub enum DriverError {
    /// Distinguished not-found shape; `path` is root-relative.
    #[error("no such file or directory: {path}")]
    NotFound { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{program} failed: {detail}")]
    Command { program: &'static str, detail: String },
}

impl DriverError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound { .. })
    }
}

/// Metadata for one stored file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Unix permission bits.
    pub mode: u32,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// A shared, namespaced object store.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Stream `reader` to `dest`, creating missing parent directories.
    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        dest: &str,
    ) -> Result<(), DriverError>;

    /// Stream `src` into `writer`.
    async fn download(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        src: &str,
    ) -> Result<(), DriverError>;

    async fn list(&self, dir: &str) -> Result<Vec<FileInfo>, DriverError>;

    /// Remove a file or a whole directory tree.
    async fn delete(&self, path: &str) -> Result<(), DriverError>;

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError>;

    /// Mirror the contents of `local_dir/` into `dest_dir/` with archive
    /// semantics (links, times, perms); pre-existing files are replaced.
    async fn rsync(&self, local_dir: &Path, dest_dir: &str) -> Result<(), DriverError>;
}
