// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster snapshot and the per-node job tables derived from it.

use bakd_core::{Job, TaskArgs, INCREMENT_SUFFIX};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;

/// Where application volumes live on every node.
pub const VOLUME_ROOT: &str = "/data/lain/volumes";

/// Expiry sweeps run every minute on each node.
pub const EXPIRE_SCHEDULE: &str = "* * * * *";

pub type SharedState = Arc<RwLock<ClusterState>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("proc {proc:?} not exist in {app}")]
    UnknownProc { app: String, proc: String },

    #[error("node not exist for app={app}, proc={proc}, instanceNo={instance_no}")]
    UnknownInstance { app: String, proc: String, instance_no: i64 },

    #[error("{app} {proc} having no backup volumes")]
    NoVolumes { app: String, proc: String },
}

/// One container of a pod, as the discovery service reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "nodeIp", default)]
    pub node_ip: String,
}

/// One pod under a `<app>.<proctype>.<procname>` key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodInfo {
    #[serde(rename = "instanceNo", default)]
    pub instance_no: i64,
    /// Raw JSON annotation carrying the backup declarations.
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

/// Decoded desired-state snapshot: proc key → pods.
pub type CoreInfo = HashMap<String, Vec<PodInfo>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub backup: Vec<BackupDecl>,
}

/// One per-app backup declaration from a pod annotation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupDecl {
    #[serde(default)]
    pub procname: String,
    #[serde(default)]
    pub expire: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub volume: String,
    #[serde(rename = "preRun", default)]
    pub pre_run: String,
    #[serde(rename = "postRun", default)]
    pub post_run: String,
    #[serde(default)]
    pub mode: String,
}

impl BackupDecl {
    pub fn valid(&self) -> bool {
        !self.procname.is_empty()
            && !self.volume.is_empty()
            && !self.expire.is_empty()
            && !self.schedule.is_empty()
    }

    /// `/data/lain/volumes/<app>/<fullProc>/<instanceNo>/<volume>`
    fn dir(&self, app: &str, instance_no: i64) -> String {
        abs_dir(app, &self.procname, instance_no, &self.volume)
    }

    /// `<app>-<fullProc>-<instanceNo>-<volume>` with `/` → `-`.
    fn archive(&self, app: &str, instance_no: i64) -> String {
        format!("{}/{}/{}{}", app, self.procname, instance_no, self.volume).replace('/', "-")
    }
}

pub(crate) fn abs_dir(app: &str, full_proc: &str, instance_no: i64, volume: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        VOLUME_ROOT,
        app,
        full_proc,
        instance_no,
        volume.trim_start_matches('/')
    )
}

pub(crate) fn valid_ip(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok() && s.split('.').count() == 4
}

/// Controller-side view of the cluster: the latest snapshot plus the
/// job tables, volume table, and proc-name table derived from it.
///
/// The watch loop is the sole writer; fan-out handlers and the liveness
/// loop read through the surrounding lock.
#[derive(Default)]
pub struct ClusterState {
    data: CoreInfo,
    cron_jobs: HashMap<String, Vec<Job>>,
    volumes: HashMap<String, Vec<String>>,
    proc_full_name: HashMap<String, String>,
}

impl ClusterState {
    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Ingest a decoded snapshot, rebuild every per-node job list, and
    /// return the nodes whose list drifted from the last-sent one.
    pub fn apply_snapshot(&mut self, snapshot: CoreInfo) -> Vec<String> {
        let mut backup_dict: HashMap<String, Vec<(String, BackupDecl, i64, Vec<String>)>> =
            HashMap::new();

        // Snapshot maps have no stable order; derive jobs in sorted key
        // order so positional drift checks compare like with like.
        let mut proc_keys: Vec<&String> = snapshot.keys().collect();
        proc_keys.sort();

        for proc_key in proc_keys {
            let Some(pods) = snapshot.get(proc_key) else { continue };
            let fields: Vec<&str> = proc_key.split('.').collect();
            let [app, _, proc] = fields.as_slice() else { continue };
            self.proc_full_name.insert(format!("{}.{}", app, proc), proc_key.clone());

            for pod in pods {
                let annotation: Annotation = match serde_json::from_str(&pod.annotation) {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::error!(%proc_key, error = %e, "fail to unmarshal annotation");
                        continue;
                    }
                };
                let cids: Vec<String> = pod.containers.iter().map(|c| c.id.clone()).collect();
                let volume_key = format!("{}.{}", app, proc);
                self.volumes.insert(volume_key.clone(), Vec::new());
                for decl in &annotation.backup {
                    if !decl.valid() {
                        tracing::warn!(?decl, "backup spec uncorrected, skip");
                        continue;
                    }
                    for container in &pod.containers {
                        if !valid_ip(&container.node_ip) {
                            continue;
                        }
                        backup_dict.entry(container.node_ip.clone()).or_default().push((
                            app.to_string(),
                            decl.clone(),
                            pod.instance_no,
                            cids.clone(),
                        ));
                    }
                    if let Some(vols) = self.volumes.get_mut(&volume_key) {
                        vols.push(decl.volume.clone());
                    }
                }
            }
        }

        let mut new_jobs: HashMap<String, Vec<Job>> = HashMap::new();
        for (node_ip, backups) in backup_dict {
            let mut expire_info: Vec<String> = Vec::new();
            let mut jobs = Vec::new();
            for (app, decl, instance_no, cids) in &backups {
                let args: TaskArgs = [
                    ("path", json!(decl.dir(app, *instance_no))),
                    ("archive", json!(decl.archive(app, *instance_no))),
                    ("instanceNo", json!(instance_no)),
                    ("preRun", json!(decl.pre_run)),
                    ("postRun", json!(decl.post_run)),
                    ("containers", json!(cids)),
                    ("app", json!(app)),
                    ("proc", json!(decl.procname)),
                    ("volume", json!(decl.volume)),
                    ("mode", json!(decl.mode)),
                ]
                .into_iter()
                .collect();
                match Job::new(decl.schedule.clone(), "backup", args).with_generated_id(&node_ip) {
                    Ok(job) => jobs.push(job),
                    Err(e) => {
                        tracing::warn!(%node_ip, error = %e, "fail to stamp job id, skip");
                        continue;
                    }
                }
                let dir = if decl.mode == "increment" {
                    format!("{}{}", decl.dir(app, *instance_no), INCREMENT_SUFFIX)
                } else {
                    decl.dir(app, *instance_no)
                };
                expire_info.push(dir);
                expire_info.push(decl.expire.clone());
            }
            if !expire_info.is_empty() {
                let args: TaskArgs = [("info", json!(expire_info))].into_iter().collect();
                match Job::new(EXPIRE_SCHEDULE, "backup_expire", args).with_generated_id(&node_ip) {
                    Ok(job) => jobs.push(job),
                    Err(e) => tracing::warn!(%node_ip, error = %e, "fail to stamp expire job id"),
                }
            }
            new_jobs.insert(node_ip, jobs);
        }

        let mut changed: Vec<String> = new_jobs
            .iter()
            .filter(|(node, jobs)| self.cron_jobs.get(*node) != Some(*jobs))
            .map(|(node, _)| node.clone())
            .collect();
        changed.sort();

        self.cron_jobs = new_jobs;
        self.data = snapshot;
        changed
    }

    /// Last-derived job list for a node.
    pub fn jobs_for(&self, node: &str) -> Vec<Job> {
        self.cron_jobs.get(node).cloned().unwrap_or_default()
    }

    pub fn all_jobs(&self) -> HashMap<String, Vec<Job>> {
        self.cron_jobs.clone()
    }

    /// Every node with a derived job list, in stable (numeric) order.
    pub fn known_nodes(&self) -> Vec<String> {
        sort_nodes(self.cron_jobs.keys().cloned().collect())
    }

    /// Mirror a sleep/wakeup action into the cached job table so the
    /// next drift check does not immediately revert it.
    pub fn set_job_sleep(&mut self, node: &str, id: &str, sleep: bool) {
        if let Some(jobs) = self.cron_jobs.get_mut(node) {
            for job in jobs.iter_mut().filter(|j| j.id == id) {
                job.sleep = sleep;
            }
        }
    }

    pub fn proc_full_name(&self, app: &str, proc: &str) -> Option<String> {
        if proc.split('.').count() > 1 {
            return Some(proc.to_string());
        }
        self.proc_full_name.get(&format!("{}.{}", app, proc)).cloned()
    }

    fn core_info(&self, app: &str) -> CoreInfo {
        let prefix = format!("{}.", app);
        self.data
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Distinct node addresses for an app, optionally narrowed to one
    /// proc; sorted numerically for deterministic fan-out.
    pub fn nodes(&self, app: &str, proc: &str) -> Result<Vec<String>, StateError> {
        let info = self.core_info(app);
        let pods: Vec<&PodInfo> = if proc.is_empty() {
            info.values().flatten().collect()
        } else {
            let key = self.proc_full_name(app, proc).ok_or_else(|| StateError::UnknownProc {
                app: app.to_string(),
                proc: proc.to_string(),
            })?;
            info.get(&key)
                .ok_or_else(|| StateError::UnknownProc {
                    app: app.to_string(),
                    proc: proc.to_string(),
                })?
                .iter()
                .collect()
        };
        let mut nodes: Vec<String> = pods
            .iter()
            .flat_map(|p| p.containers.iter().map(|c| c.node_ip.clone()))
            .collect();
        nodes.sort();
        nodes.dedup();
        Ok(sort_nodes(nodes))
    }

    /// The node hosting one instance of a proc.
    pub fn node_of(&self, app: &str, proc: &str, instance_no: i64) -> Result<String, StateError> {
        let key = self.proc_full_name(app, proc).ok_or_else(|| StateError::UnknownProc {
            app: app.to_string(),
            proc: proc.to_string(),
        })?;
        let pods = self.core_info(app);
        let pods = pods.get(&key).ok_or_else(|| StateError::UnknownProc {
            app: app.to_string(),
            proc: proc.to_string(),
        })?;
        pods.iter()
            .find(|p| p.instance_no == instance_no)
            .and_then(|p| p.containers.first())
            .map(|c| c.node_ip.clone())
            .ok_or_else(|| StateError::UnknownInstance {
                app: app.to_string(),
                proc: proc.to_string(),
                instance_no,
            })
    }

    /// Absolutize user-supplied volumes across every instance of a proc.
    pub fn volume_abs(&self, app: &str, proc: &str, volumes: &[String]) -> Vec<String> {
        let mut ret = Vec::new();
        for (key, pods) in self.core_info(app) {
            if key.rsplit('.').next() != Some(proc) {
                continue;
            }
            for pod in pods {
                for volume in volumes {
                    if let Some(full) = self.proc_full_name(app, proc) {
                        ret.push(abs_dir(app, &full, pod.instance_no, volume));
                    }
                }
            }
        }
        ret
    }

    pub fn abs_dir(&self, app: &str, proc: &str, instance_no: i64, volume: &str) -> Option<String> {
        self.proc_full_name(app, proc)
            .map(|full| abs_dir(app, &full, instance_no, volume))
    }

    /// Declared backup volumes of a proc.
    pub fn volumes(&self, app: &str, proc: &str) -> Result<Vec<String>, StateError> {
        self.volumes
            .get(&format!("{}.{}", app, short_proc(proc)))
            .cloned()
            .ok_or_else(|| StateError::NoVolumes { app: app.to_string(), proc: proc.to_string() })
    }
}

fn short_proc(proc: &str) -> &str {
    proc.rsplit('.').next().unwrap_or(proc)
}

fn sort_nodes(mut nodes: Vec<String>) -> Vec<String> {
    nodes.sort_by_key(|n| n.parse::<Ipv4Addr>().map(u32::from).unwrap_or(u32::MAX));
    nodes
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
