// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-archive and incremental backup pipelines.

use super::BackupError;
use bakd_core::{BackupEntity, INCREMENT_SUFFIX};
use bakd_storage::{Driver, Meta};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Stream a gzip tarball of the entity's source straight into the
/// driver, then catalogue it.
pub(crate) async fn full_backup(
    driver: &dyn Driver,
    meta: &Meta,
    namespace: &str,
    ent: &mut BackupEntity,
) -> Result<(), BackupError> {
    let dest = format!("{}/{}", namespace, ent.name);

    let mut child = Command::new("tar")
        .arg("-Szcf")
        .arg("-")
        .arg(ent.base_name())
        .current_dir(ent.work_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdout = child.stdout.take().ok_or(BackupError::Pipe("stdout"))?;
    let mut stderr = child.stderr.take().ok_or(BackupError::Pipe("stderr"))?;
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    // The upload must drain tar's stdout to EOF before the child is
    // reaped; waiting first would close the pipe under the uploader.
    if let Err(e) = driver.upload(&mut stdout, &dest).await {
        let _ = child.kill().await;
        let _ = child.wait().await;
        return Err(e.into());
    }

    let status = child.wait().await?;
    if !status.success() {
        let stderr = stderr_task.await.unwrap_or_default();
        return Err(BackupError::Tar { status: status.to_string(), stderr });
    }

    ent.size = match driver.stat(&dest).await {
        Ok(info) => info.size,
        Err(_) => 0,
    };

    meta.add(ent.clone());
    if let Err(e) = meta.sync().await {
        // The uploaded tarball is orphaned but invisible without its
        // catalogue entry.
        tracing::error!(error = %e, "fail to sync meta file to backends");
        meta.delete(&ent.name);
    }
    tracing::debug!(source = %ent.source, "succeed the backup task");
    Ok(())
}

/// Mirror the source directory into shared storage and replace the
/// source's single increment entity.
pub(crate) async fn increment_backup(
    driver: &dyn Driver,
    meta: &Meta,
    namespace: &str,
    ent: &BackupEntity,
) -> Result<(), BackupError> {
    driver
        .rsync(Path::new(&ent.source), &format!("{}/{}", namespace, ent.name))
        .await?;
    meta.set(&format!("{}{}", ent.source, INCREMENT_SUFFIX), vec![ent.clone()]);
    meta.sync().await?;
    tracing::debug!(source = %ent.source, "success increment backup task");
    Ok(())
}
