// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task functions the daemon registers with the scheduler engine.

use super::{archive, recover, BackupContext, BackupError, SlotState};
use super::{BACKUP_ACTION, EXPIRE_ACTION, RECOVER_ACTION};
use crate::engine::{task_fn, Engine, EngineError};
use bakd_core::{parse_expire, BackupEntity, BackupMode, Clock, TaskArgs, TaskError, TaskValues};
use bakd_storage::Meta;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Register `backup`, `backup_expire`, and `backup_recover`.
pub fn register_tasks<C: Clock>(
    engine: &Engine<C>,
    ctx: Arc<BackupContext<C>>,
) -> Result<(), EngineError> {
    let backup_ctx = Arc::clone(&ctx);
    engine.register(
        BACKUP_ACTION,
        task_fn(move |args| {
            let ctx = Arc::clone(&backup_ctx);
            async move { backup_task(ctx, args).await }
        }),
    )?;

    let expire_ctx = Arc::clone(&ctx);
    engine.register(
        EXPIRE_ACTION,
        task_fn(move |args| {
            let ctx = Arc::clone(&expire_ctx);
            async move { expire_task(ctx, args).await }
        }),
    )?;

    engine.register(
        RECOVER_ACTION,
        task_fn(move |args| {
            let ctx = Arc::clone(&ctx);
            async move { recover_task(ctx, args).await }
        }),
    )?;
    Ok(())
}

async fn backup_task<C: Clock>(
    ctx: Arc<BackupContext<C>>,
    args: TaskArgs,
) -> Result<TaskValues, TaskError> {
    let path = args.str("path", "");
    let archive_name = args.str("archive", "");
    let instance_no = args.int("instanceNo", 0);
    let pre_run = args.str("preRun", "");
    let post_run = args.str("postRun", "");
    let containers = args.str_slice("containers", &[]);
    let volume = args.str("volume", "");
    let mode = match args.str("mode", "full").as_str() {
        "increment" => BackupMode::Increment,
        _ => BackupMode::Full,
    };

    if tokio::fs::metadata(&path).await.is_err() {
        tracing::error!(%path, "directory not exist, can not back it up");
        return Err(BackupError::MissingSource(path).into());
    }
    let _slot = ctx.slots.acquire(&path, SlotState::Backuping)?;
    tracing::info!(%path, "running a backup task");

    if !pre_run.is_empty() {
        for cid in &containers {
            ctx.exec.exec(cid, &pre_run).await.map_err(|e| BackupError::Hook {
                hook: "preRun",
                script: pre_run.clone(),
                container: cid.clone(),
                source: e,
            })?;
        }
    }

    let mut ent = BackupEntity::new(
        &path,
        &archive_name,
        instance_no,
        containers.clone(),
        &volume,
        mode,
        &ctx.namespace,
        ctx.clock.now_utc(),
    );
    match mode {
        BackupMode::Increment => {
            archive::increment_backup(ctx.driver.as_ref(), &ctx.meta, &ctx.namespace, &ent).await?
        }
        BackupMode::Full => {
            archive::full_backup(ctx.driver.as_ref(), &ctx.meta, &ctx.namespace, &mut ent).await?
        }
    }

    if !post_run.is_empty() {
        for cid in &containers {
            ctx.exec.exec(cid, &post_run).await.map_err(|e| BackupError::Hook {
                hook: "postRun",
                script: post_run.clone(),
                container: cid.clone(),
                source: e,
            })?;
        }
    }

    let mut result = TaskValues::new();
    result.insert("file".into(), ent.name.clone().into());
    result.insert("size".into(), ent.size.into());
    Ok(result)
}

/// `info` is a flat list of alternating `[source, duration]` pairs.
/// Unparsable durations drop their pair; a source absent from the map
/// never expires, and increment entities never expire at all.
async fn expire_task<C: Clock>(
    ctx: Arc<BackupContext<C>>,
    args: TaskArgs,
) -> Result<TaskValues, TaskError> {
    let info = args.str_slice("info", &[]);
    tracing::info!("running a backup expire task");

    let mut expire_map: HashMap<String, Duration> = HashMap::new();
    for pair in info.chunks(2) {
        let [source, setting] = pair else { continue };
        match parse_expire(setting) {
            Ok(dur) => {
                expire_map.insert(source.clone(), dur);
            }
            Err(e) => tracing::warn!(setting = %setting, error = %e, "fail to parse expire setting, abandon"),
        }
    }

    let now = ctx.clock.now_utc();
    let mut counter = 0usize;
    for item in ctx.meta.array(&[]) {
        if item.mode == BackupMode::Increment {
            continue;
        }
        let Some(dur) = expire_map.get(&item.source) else { continue };
        let age = now - item.created;
        if age > chrono::Duration::seconds(dur.as_secs().min(i64::MAX as u64) as i64) {
            counter += 1;
            tracing::debug!(name = %item.name, "backup expired, delete it");
            if let Err(e) = ctx.meta.delete_backup(&item.name).await {
                tracing::warn!(name = %item.name, error = %e, "fail to delete expired backup");
            }
        }
    }
    tracing::info!(deleted = counter, "backup expire task finished");
    Ok(TaskValues::new())
}

async fn recover_task<C: Clock>(
    ctx: Arc<BackupContext<C>>,
    args: TaskArgs,
) -> Result<TaskValues, TaskError> {
    let ns_arg = args.str("namespace", "");
    let file = args.str("backup", "");
    let dest_dir = args.str("destDir", "");
    if file.is_empty() {
        return Err(BackupError::EmptyRecoverFile.into());
    }
    tracing::info!(namespace = %ns_arg, %file, "recovering");

    // A foreign namespace means migration: read that node's catalogue,
    // never write into it.
    let (ns, found) = if !ns_arg.is_empty() && ns_arg != ctx.namespace {
        let remote = Meta::new(Arc::clone(&ctx.driver), ns_arg.clone());
        remote.load_from_backend().await?;
        (ns_arg, remote.get(&file))
    } else {
        (ctx.namespace.clone(), ctx.meta.get(&file))
    };
    let mut ent = found.ok_or_else(|| BackupError::UnknownBackup {
        file: file.clone(),
        namespace: ns.clone(),
    })?;

    if !dest_dir.is_empty() {
        ent.source = dest_dir;
    }
    let _slot = ctx.slots.acquire(&ent.source, SlotState::Recovering)?;

    if ent.mode == BackupMode::Increment {
        let files = args.str_slice("files", &[]);
        tracing::debug!(?files, "increment backup, recover files");
        recover::increment_recover(ctx.driver.as_ref(), &ns, &ent, &files).await?;
    } else {
        recover::recover(ctx.driver.as_ref(), &ns, &ent).await?;
    }
    Ok(TaskValues::new())
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
