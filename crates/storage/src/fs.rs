// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver backed by a shared filesystem mount (NFS, MooseFS, CephFS...).

use crate::driver::{Driver, DriverError, FileInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Stores everything under a single mounted root directory.
pub struct FsDriver {
    root: PathBuf,
}

impl FsDriver {
    /// Open the driver rooted at `root`, creating the directory if absent.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, DriverError> {
        let root = root.into();
        match tokio::fs::metadata(&root).await {
            Ok(info) if !info.is_dir() => {
                return Err(DriverError::Command {
                    program: "fs-driver",
                    detail: format!("{} exists but is not a directory", root.display()),
                })
            }
            Ok(_) => {}
            Err(_) => tokio::fs::create_dir_all(&root).await?,
        }
        Ok(Self { root })
    }

    /// Verify the mount is still reachable.
    pub async fn probe(&self) -> Result<(), DriverError> {
        tokio::fs::metadata(&self.root).await?;
        Ok(())
    }

    fn full(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    // Report root-relative paths in not-found errors so callers never see
    // the mount location.
    fn not_found(&self, rel: &str) -> DriverError {
        DriverError::NotFound { path: rel.to_string() }
    }

    fn map_io(&self, rel: &str, err: std::io::Error) -> DriverError {
        if err.kind() == std::io::ErrorKind::NotFound {
            self.not_found(rel)
        } else {
            DriverError::Io(err)
        }
    }
}

fn file_info(name: String, meta: &std::fs::Metadata) -> FileInfo {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode = 0o644;

    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();
    FileInfo {
        name,
        size: meta.len(),
        mode,
        modified,
        is_dir: meta.is_dir(),
    }
}

#[async_trait]
impl Driver for FsDriver {
    fn name(&self) -> &str {
        "fs"
    }

    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        dest: &str,
    ) -> Result<(), DriverError> {
        let path = self.full(dest);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(&path).await?;
        tokio::io::copy(reader, &mut out).await?;
        out.flush().await?;
        out.sync_all().await?;
        Ok(())
    }

    async fn download(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        src: &str,
    ) -> Result<(), DriverError> {
        let path = self.full(src);
        let mut input = tokio::fs::File::open(&path)
            .await
            .map_err(|e| self.map_io(src, e))?;
        tokio::io::copy(&mut input, writer).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<FileInfo>, DriverError> {
        let path = self.full(dir);
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| self.map_io(dir, e))?;
        let mut ret = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            ret.push(file_info(entry.file_name().to_string_lossy().into_owned(), &meta));
        }
        ret.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ret)
    }

    async fn delete(&self, path: &str) -> Result<(), DriverError> {
        let full = self.full(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| self.map_io(path, e))?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
        } else {
            tokio::fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, DriverError> {
        let full = self.full(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| self.map_io(path, e))?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(file_info(name, &meta))
    }

    async fn rsync(&self, local_dir: &Path, dest_dir: &str) -> Result<(), DriverError> {
        let dest = self.full(dest_dir);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let output = Command::new("rsync")
            .arg("-az")
            .arg("--safe-links")
            .arg(format!("{}/", local_dir.display()))
            .arg(format!("{}/", dest.display()))
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(DriverError::Command {
                program: "rsync",
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
