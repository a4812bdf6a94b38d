// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full and incremental recovery.
//!
//! Full recovery extracts into `<source>.recovering/`, snapshots the
//! live directory into `<source>.bak/`, and only then touches the
//! source; any failure restores the snapshot, falling back to a
//! directory rename as the last resort.

use super::BackupError;
use bakd_core::BackupEntity;
use bakd_storage::Driver;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Removes scratch directories on every exit path.
struct Scratch(Vec<PathBuf>);

impl Scratch {
    fn push(&mut self, path: impl Into<PathBuf>) {
        self.0.push(path.into());
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

pub(crate) async fn recover(
    driver: &dyn Driver,
    ns: &str,
    ent: &BackupEntity,
) -> Result<(), BackupError> {
    let recover_dir = format!("{}.recovering", ent.source);
    if tokio::fs::metadata(&recover_dir).await.is_ok() {
        tokio::fs::remove_dir_all(&recover_dir).await?;
    }
    tokio::fs::create_dir_all(&recover_dir).await?;
    let mut scratch = Scratch(vec![PathBuf::from(&recover_dir)]);

    let mut child = Command::new("tar")
        .args(["-zxf", "-", "-C", &recover_dir])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child.stdin.take().ok_or(BackupError::Pipe("stdin"))?;
    let mut stderr = child.stderr.take().ok_or(BackupError::Pipe("stderr"))?;
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    // Feed the download into tar; closing stdin is what lets tar
    // finish, so the downloader must complete before the child is
    // reaped, mirroring the backup pipeline.
    let downloaded = driver.download(&mut stdin, &format!("{}/{}", ns, ent.name)).await;
    drop(stdin);
    if let Err(e) = downloaded {
        let _ = child.kill().await;
        let _ = child.wait().await;
        return Err(e.into());
    }

    let status = child.wait().await?;
    if !status.success() {
        let stderr = stderr_task.await.unwrap_or_default();
        return Err(BackupError::Tar { status: status.to_string(), stderr });
    }

    let bak_dir = format!("{}.bak", ent.source);
    if tokio::fs::metadata(&bak_dir).await.is_ok() {
        tokio::fs::remove_dir_all(&bak_dir).await?;
    }
    scratch.push(&bak_dir);
    clone_dir(&ent.source, &bak_dir).await?;

    let extracted = format!("{}/{}", recover_dir, ent.base_name());
    if let Err(e) = clone_dir(&extracted, &ent.source).await {
        tracing::warn!(error = %e, source = %ent.source, "recover failed, restoring from snapshot");
        if clone_dir(&bak_dir, &ent.source).await.is_err() {
            // Renaming makes the volume vanish from running containers;
            // they must restart afterwards.
            let _ = std::fs::remove_dir_all(&ent.source);
            std::fs::rename(&bak_dir, &ent.source).map_err(|re| BackupError::RenameFatal {
                from: bak_dir.clone(),
                to: ent.source.clone(),
                detail: re.to_string(),
            })?;
        }
        return Err(e);
    }
    Ok(())
}

/// `rsync` mirror with archive-ish semantics and delete-before, used
/// for the snapshot/restore steps.
pub(crate) async fn clone_dir(src: &str, dest: &str) -> Result<(), BackupError> {
    let output = Command::new("rsync")
        .args(["-rIptgo", "--delete-before"])
        .arg(format!("{}/", src.trim_end_matches('/')))
        .arg(format!("{}/", dest.trim_end_matches('/')))
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        return Err(BackupError::CloneDir {
            src: src.to_string(),
            dest: dest.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Restore chosen files of an incremental backup onto the source.
pub(crate) async fn increment_recover(
    driver: &dyn Driver,
    ns: &str,
    ent: &BackupEntity,
    files: &[String],
) -> Result<(), BackupError> {
    let path_base = format!("{}/{}", ns, ent.name);
    let mut file_list = Vec::new();
    if files.len() == 1 && files[0] == "*" {
        file_list = find_all_files(driver, &path_base, "*").await?;
    } else {
        for f in files {
            file_list.extend(find_all_files(driver, &path_base, f).await?);
        }
    }

    for file in file_list {
        let rel = file.strip_prefix(&path_base).unwrap_or(&file);
        let dest = format!("{}{}", ent.source, rel);
        let info = driver.stat(&file).await?;
        if let Some(parent) = Path::new(&dest).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut handle = tokio::fs::File::create(&dest).await?;
        driver.download(&mut handle, &file).await?;
        handle.sync_all().await?;
        drop(handle);
        restore_metadata(&dest, &info)?;
    }
    Ok(())
}

fn restore_metadata(dest: &str, info: &bakd_storage::FileInfo) -> Result<(), BackupError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(info.mode))?;
    }
    let handle = std::fs::File::options().write(true).open(dest)?;
    handle.set_modified(info.modified.into())?;
    Ok(())
}

/// Expand a requested file into storage leaf paths, recursing through
/// directories via driver list/stat.
pub(crate) async fn find_all_files(
    driver: &dyn Driver,
    root: &str,
    file: &str,
) -> Result<Vec<String>, BackupError> {
    let mut out = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    if file == "*" {
        stack.push(root.to_string());
    } else {
        let path = format!("{}/{}", root, file.trim_start_matches('/'));
        let info = driver.stat(&path).await?;
        if info.is_dir {
            stack.push(path);
        } else {
            out.push(path);
        }
    }

    while let Some(dir) = stack.pop() {
        for entry in driver.list(&dir).await? {
            let path = format!("{}/{}", dir, entry.name);
            if entry.is_dir {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}
