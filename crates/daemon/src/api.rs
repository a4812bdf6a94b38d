// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed handlers behind the daemon's RPC surface.
//!
//! The HTTP router mounting these lives outside the workspace; handlers
//! take decoded parameters and return values or an [`ApiError`] that
//! maps onto a 400-class or 503-class response.

use crate::backup::RECOVER_ACTION;
use crate::DaemonContext;
use bakd_core::{BackupEntity, Clock, Job, TaskArgs};
use bakd_wire::{DebugInfo, EntrySpec, FInfo, JobsUpdate, OnceReply, RecoverRequest};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("backup action failed: {0}")]
    Backup(String),
}

impl ApiError {
    /// The HTTP status class the transport should answer with.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Backup(_) => 503,
        }
    }
}

/// The daemon's operation surface, one method per route.
pub struct Api<C: Clock> {
    ctx: Arc<DaemonContext<C>>,
}

impl<C: Clock> Api<C> {
    pub fn new(ctx: Arc<DaemonContext<C>>) -> Self {
        Self { ctx }
    }

    // ── Cron ────────────────────────────────────────────────────────

    pub fn jobs(&self, query: &HashMap<String, String>) -> Vec<EntrySpec> {
        self.ctx.engine.entries(query)
    }

    pub fn job(&self, id: &str) -> Result<Job, ApiError> {
        if id.is_empty() {
            return Err(ApiError::Validation("cron job id is empty".into()));
        }
        self.ctx.engine.find_by_id(id).map_err(|e| ApiError::Validation(e.to_string()))
    }

    /// Replace the job set. Returns `false` when the version matches and
    /// nothing was touched.
    pub async fn set_jobs(&self, update: JobsUpdate) -> Result<bool, ApiError> {
        if !update.version.is_empty() && update.version == self.ctx.engine.version() {
            tracing::debug!("same task version, do not update");
            return Ok(false);
        }
        tracing::info!(count = update.data.len(), "cron tasks changed");
        self.ctx.engine.update(update.data, &update.version).await;
        self.ctx.mark_updated();
        Ok(true)
    }

    pub fn count(&self) -> usize {
        self.ctx.engine.count()
    }

    pub fn start(&self) {
        self.ctx.engine.start();
    }

    pub fn stop(&self) {
        self.ctx.engine.stop();
    }

    pub fn once(&self, id: &str) -> Result<OnceReply, ApiError> {
        let job = self.job(id)?;
        Ok(OnceReply { rid: self.ctx.engine.once(&job) })
    }

    /// `run`, `sleep`, or `wakeup` on a job. Only `run` yields a rid.
    pub fn job_action(&self, id: &str, action: &str) -> Result<Option<OnceReply>, ApiError> {
        if id.is_empty() {
            return Err(ApiError::Validation("cron job id is empty".into()));
        }
        match action.to_lowercase().as_str() {
            "run" => Ok(Some(self.once(id)?)),
            "sleep" => {
                self.ctx.engine.sleep(id, true);
                Ok(None)
            }
            "wakeup" => {
                self.ctx.engine.sleep(id, false);
                Ok(None)
            }
            other => Err(ApiError::Validation(format!("unknown action {:?}", other))),
        }
    }

    // ── Backup ──────────────────────────────────────────────────────

    pub fn backups(&self, dirs: &[String]) -> Vec<BackupEntity> {
        tracing::info!(?dirs, "getting backup list");
        self.ctx.backup.meta.array(dirs)
    }

    pub fn backup_info(&self, name: &str) -> Result<BackupEntity, ApiError> {
        self.ctx
            .backup
            .meta
            .get(name)
            .ok_or_else(|| ApiError::Backup(format!("backup named {} not found", name)))
    }

    /// Directory listing under a backup in this node's namespace.
    pub async fn backup_file_list(&self, dir: &str) -> Result<Vec<FInfo>, ApiError> {
        let ns = &self.ctx.backup.namespace;
        let infos = self
            .ctx
            .backup
            .driver
            .list(&format!("{}/{}", ns, dir))
            .await
            .map_err(|e| ApiError::Backup(e.to_string()))?;
        Ok(infos.into_iter().map(FInfo::from).collect())
    }

    pub async fn delete_backups(&self, files: &[String]) -> Result<(), ApiError> {
        for file in files {
            self.ctx
                .backup
                .meta
                .delete_backup(file)
                .await
                .map_err(|e| ApiError::Backup(e.to_string()))?;
        }
        Ok(())
    }

    /// Queue a recover (full or incremental) as a once-run and return
    /// its record id.
    pub fn recover(&self, file: &str, req: RecoverRequest) -> Result<OnceReply, ApiError> {
        let args: TaskArgs = [
            ("namespace", json!(req.namespace)),
            ("backup", json!(file)),
            ("files", json!(req.files)),
            ("destDir", json!(req.dest_dir)),
            ("app", json!(req.app)),
            ("proc", json!(req.proc)),
        ]
        .into_iter()
        .collect();
        let rid = self
            .ctx
            .engine
            .raw_once(RECOVER_ACTION, args)
            .map_err(|e| ApiError::Backup(e.to_string()))?;
        Ok(OnceReply { rid })
    }

    // ── Notify ──────────────────────────────────────────────────────

    pub fn add_notify(&self, addr: &str) {
        self.ctx.notify.add(addr);
    }

    pub fn remove_notify(&self, addr: &str) {
        self.ctx.notify.remove(addr);
    }

    pub fn notify_addrs(&self) -> Vec<String> {
        self.ctx.notify.list()
    }

    // ── Debug ───────────────────────────────────────────────────────

    pub fn debug(&self) -> DebugInfo {
        let update_time = match self.ctx.updated_at() {
            Some(at) => at.to_rfc3339(),
            // Zero-value sentinel the controller's liveness poll keys on.
            None => "0001-01-01T00:00:00Z".to_string(),
        };
        DebugInfo {
            start_time: self.ctx.started_at,
            update_time,
            crond_status: self.ctx.engine.status().to_string(),
            running_tasks: self.ctx.engine.running_count(),
            job_count: self.ctx.engine.count(),
        }
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
