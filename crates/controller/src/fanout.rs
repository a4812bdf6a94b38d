// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-app fan-out of user operations to the owning daemons.

use crate::client::{ClientError, DaemonClient};
use crate::state::{SharedState, StateError};
use bakd_core::{parse_ip_from_id, BackupEntity, IdError, Job};
use bakd_wire::{EntrySpec, FInfo, RecoverRequest};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("can not find backup file by name {0}")]
    BackupNotFound(String),

    #[error("no permission to delete {0}")]
    DeleteForbidden(String),
}

/// App-scoped controller operations.
pub struct AppController<D: DaemonClient> {
    app: String,
    state: SharedState,
    client: Arc<D>,
}

/// Strip the controller-internal `path`/`archive` args from backup jobs
/// before they reach users.
fn fix_job_args(job: &mut Job) {
    if job.action == "backup" {
        job.args.0.remove("path");
        job.args.0.remove("archive");
    }
}

impl<D: DaemonClient> AppController<D> {
    pub fn new(app: impl Into<String>, state: SharedState, client: Arc<D>) -> Self {
        Self { app: app.into(), state, client }
    }

    /// Backup entities for a proc's volumes, concatenated across nodes.
    pub async fn get_backups(
        &self,
        proc: &str,
        volumes: &[String],
    ) -> Result<Vec<BackupEntity>, FanoutError> {
        let (nodes, abs_volumes) = {
            let state = self.state.read();
            (state.nodes(&self.app, proc)?, state.volume_abs(&self.app, proc, volumes))
        };
        let mut data = Vec::new();
        for node in nodes {
            data.extend(self.client.get_backups(&node, &abs_volumes).await?);
        }
        Ok(data)
    }

    /// Delete across every node of the proc; abort on the first failure.
    pub async fn delete_backups(&self, proc: &str, files: &[String]) -> Result<(), FanoutError> {
        let nodes = self.state.read().nodes(&self.app, proc)?;
        for node in nodes {
            self.client.delete_backups(&node, files).await?;
        }
        Ok(())
    }

    /// Delete with the ownership check: every requested file must belong
    /// to one of this app's backups.
    pub async fn delete_backups_checked(
        &self,
        proc: &str,
        files: &[String],
    ) -> Result<(), FanoutError> {
        let volumes = self.state.read().volumes(&self.app, proc)?;
        let backups = self.get_backups(proc, &volumes).await?;
        for file in files {
            let base = file.split('/').next().unwrap_or(file);
            if !backups.iter().any(|e| e.name == base) {
                return Err(FanoutError::DeleteForbidden(file.clone()));
            }
        }
        self.delete_backups(proc, files).await
    }

    pub async fn get_cron_jobs(
        &self,
        query: &HashMap<String, String>,
    ) -> Result<Vec<EntrySpec>, FanoutError> {
        let nodes = self.state.read().nodes(&self.app, "")?;
        let mut query = query.clone();
        query.insert("args_app".to_string(), self.app.clone());
        let mut ret = Vec::new();
        for node in nodes {
            let mut entries = self.client.get_cron_jobs(&node, &query).await?;
            for entry in &mut entries {
                fix_job_args(&mut entry.job);
            }
            ret.extend(entries);
        }
        Ok(ret)
    }

    /// Routed by the node address embedded in the job id.
    pub async fn get_cron_job(&self, id: &str) -> Result<Job, FanoutError> {
        let node = parse_ip_from_id(id)?;
        let mut job = self.client.get_cron_job(&node, id).await?;
        fix_job_args(&mut job);
        Ok(job)
    }

    pub async fn cron_once(&self, id: &str) -> Result<String, FanoutError> {
        let node = parse_ip_from_id(id)?;
        Ok(self.client.cron_once(&node, id).await?)
    }

    /// `run`, `sleep`, or `wakeup`; sleep state is mirrored into the
    /// cached job table so the next reconcile keeps it.
    pub async fn cron_action(&self, id: &str, action: &str) -> Result<String, FanoutError> {
        let node = parse_ip_from_id(id)?;
        let ret = self.client.cron_action(&node, id, action).await?;
        match action {
            "sleep" | "wakeup" => {
                self.state.write().set_job_sleep(&node, id, action == "sleep");
            }
            _ => {}
        }
        Ok(ret)
    }

    /// First node that knows the file wins.
    pub async fn backup_file_info(
        &self,
        proc: &str,
        file: &str,
    ) -> Result<BackupEntity, FanoutError> {
        let nodes = self.state.read().nodes(&self.app, proc)?;
        for node in nodes {
            if let Ok(info) = self.client.backup_info(&node, file).await {
                return Ok(info);
            }
        }
        Err(FanoutError::BackupNotFound(file.to_string()))
    }

    /// First non-empty listing wins; node order is stable.
    pub async fn increment_file_list(
        &self,
        proc: &str,
        dir: &str,
    ) -> Result<Vec<FInfo>, FanoutError> {
        let nodes = self.state.read().nodes(&self.app, proc)?;
        for node in nodes {
            let listing = self.client.file_list(&node, dir).await?;
            if !listing.is_empty() {
                return Ok(listing);
            }
        }
        Ok(Vec::new())
    }

    /// Recover a full archive onto instance `to`, reading from the node
    /// hosting instance `from` (migration when they differ).
    pub async fn recover(
        &self,
        proc: &str,
        volume: &str,
        file: &str,
        from: i64,
        to: i64,
    ) -> Result<String, FanoutError> {
        let (node, namespace, dest_dir) = self.recover_route(proc, volume, from, to)?;
        let req = RecoverRequest {
            namespace,
            backup: file.to_string(),
            files: Vec::new(),
            dest_dir,
            app: self.app.clone(),
            proc: proc.to_string(),
        };
        Ok(self.client.recover(&node, file, &req).await?)
    }

    /// Incremental flavor of [`AppController::recover`].
    pub async fn increment_recover(
        &self,
        proc: &str,
        volume: &str,
        dir: &str,
        from: i64,
        to: i64,
        files: &[String],
    ) -> Result<String, FanoutError> {
        let (node, namespace, dest_dir) = self.recover_route(proc, volume, from, to)?;
        let req = RecoverRequest {
            namespace,
            backup: dir.to_string(),
            files: files.to_vec(),
            dest_dir,
            app: self.app.clone(),
            proc: proc.to_string(),
        };
        Ok(self.client.recover_increment(&node, dir, &req).await?)
    }

    fn recover_route(
        &self,
        proc: &str,
        volume: &str,
        from: i64,
        to: i64,
    ) -> Result<(String, String, String), FanoutError> {
        let state = self.state.read();
        let node = state.node_of(&self.app, proc, to)?;
        let namespace = state.node_of(&self.app, proc, from)?;
        let dest_dir = if volume.is_empty() {
            String::new()
        } else {
            state.abs_dir(&self.app, proc, to, volume).unwrap_or_default()
        };
        Ok((node, namespace, dest_dir))
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
