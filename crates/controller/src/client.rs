// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the daemon RPC surface.

use async_trait::async_trait;
use bakd_core::{BackupEntity, Job};
use bakd_wire::{DebugInfo, EntrySpec, FInfo, OnceReply, RecoverRequest};
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    #[error("daemon returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response from daemon: {0}")]
    Decode(String),
}

/// Idempotency token for a job list: hex MD5 over its serialization.
pub fn jobs_version(serialized: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(serialized);
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

/// Everything the controller asks of a daemon.
#[async_trait]
pub trait DaemonClient: Send + Sync + 'static {
    async fn set_cron_jobs(&self, node: &str, jobs: &[Job]) -> Result<(), ClientError>;
    async fn set_notify(&self, node: &str, addr: &str) -> Result<(), ClientError>;
    async fn debug(&self, node: &str) -> Result<DebugInfo, ClientError>;

    async fn get_cron_jobs(
        &self,
        node: &str,
        query: &HashMap<String, String>,
    ) -> Result<Vec<EntrySpec>, ClientError>;
    async fn get_cron_job(&self, node: &str, id: &str) -> Result<Job, ClientError>;
    async fn cron_once(&self, node: &str, id: &str) -> Result<String, ClientError>;
    async fn cron_action(&self, node: &str, id: &str, action: &str) -> Result<String, ClientError>;

    async fn get_backups(
        &self,
        node: &str,
        dirs: &[String],
    ) -> Result<Vec<BackupEntity>, ClientError>;
    async fn backup_info(&self, node: &str, file: &str) -> Result<BackupEntity, ClientError>;
    async fn file_list(&self, node: &str, dir: &str) -> Result<Vec<FInfo>, ClientError>;
    async fn delete_backups(&self, node: &str, files: &[String]) -> Result<(), ClientError>;
    async fn recover(
        &self,
        node: &str,
        file: &str,
        req: &RecoverRequest,
    ) -> Result<String, ClientError>;
    async fn recover_increment(
        &self,
        node: &str,
        dir: &str,
        req: &RecoverRequest,
    ) -> Result<String, ClientError>;
}

/// HTTP client against the daemon's `/api/v1` surface with a ten-second
/// per-request timeout.
pub struct HttpDaemonClient {
    client: reqwest::Client,
    port: u16,
    prefix: String,
}

impl HttpDaemonClient {
    pub fn new(port: u16) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, port, prefix: "/api/v1".to_string() }
    }

    fn url(&self, node: &str, path: &str) -> String {
        format!("http://{}:{}{}{}", node, self.port, self.prefix, path)
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        resp: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, ClientError> {
        let resp = resp
            .map_err(|e| ClientError::Transport { url: url.to_string(), detail: e.to_string() })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ClientError::Transport { url: url.to_string(), detail: e.to_string() })?;
        if status >= 300 {
            return Err(ClientError::Status { status, body });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn recover_form(req: &RecoverRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("namespace", req.namespace.clone()),
            ("destDir", req.dest_dir.clone()),
            ("app", req.app.clone()),
            ("proc", req.proc.clone()),
        ];
        for file in &req.files {
            form.push(("files", file.clone()));
        }
        form
    }
}

#[async_trait]
impl DaemonClient for HttpDaemonClient {
    async fn set_cron_jobs(&self, node: &str, jobs: &[Job]) -> Result<(), ClientError> {
        let data = serde_json::to_string(jobs).map_err(|e| ClientError::Decode(e.to_string()))?;
        let version = jobs_version(&data);
        let url = self.url(node, "/cron/jobs");
        let resp = self
            .client
            .put(&url)
            .form(&[("data", data.as_str()), ("version", version.as_str())])
            .send()
            .await;
        Self::decode::<serde_json::Value>(&url, resp).await.map(|_| ())
    }

    async fn set_notify(&self, node: &str, addr: &str) -> Result<(), ClientError> {
        let url = self.url(node, "/notify");
        let resp = self.client.put(&url).form(&[("addr", addr)]).send().await;
        Self::decode::<serde_json::Value>(&url, resp).await.map(|_| ())
    }

    async fn debug(&self, node: &str) -> Result<DebugInfo, ClientError> {
        let url = self.url(node, "/debug");
        let resp = self.client.get(&url).send().await;
        Self::decode(&url, resp).await
    }

    async fn get_cron_jobs(
        &self,
        node: &str,
        query: &HashMap<String, String>,
    ) -> Result<Vec<EntrySpec>, ClientError> {
        let url = self.url(node, "/cron/jobs");
        let resp = self.client.get(&url).query(query).send().await;
        Self::decode(&url, resp).await
    }

    async fn get_cron_job(&self, node: &str, id: &str) -> Result<Job, ClientError> {
        let url = self.url(node, &format!("/cron/jobs/{}", id));
        let resp = self.client.get(&url).send().await;
        Self::decode(&url, resp).await
    }

    async fn cron_once(&self, node: &str, id: &str) -> Result<String, ClientError> {
        let url = self.url(node, &format!("/cron/once/{}", id));
        let resp = self.client.post(&url).send().await;
        let reply: OnceReply = Self::decode(&url, resp).await?;
        Ok(reply.rid)
    }

    async fn cron_action(&self, node: &str, id: &str, action: &str) -> Result<String, ClientError> {
        let url = self.url(node, &format!("/cron/jobs/{}/actions/{}", id, action));
        let resp = self.client.post(&url).send().await;
        if action == "run" {
            let reply: OnceReply = Self::decode(&url, resp).await?;
            return Ok(reply.rid);
        }
        Self::decode::<serde_json::Value>(&url, resp).await.map(|_| "OK".to_string())
    }

    async fn get_backups(
        &self,
        node: &str,
        dirs: &[String],
    ) -> Result<Vec<BackupEntity>, ClientError> {
        let url = self.url(node, "/backup/json");
        let query: Vec<(&str, &str)> = dirs.iter().map(|d| ("dir", d.as_str())).collect();
        let resp = self.client.get(&url).query(&query).send().await;
        Self::decode(&url, resp).await
    }

    async fn backup_info(&self, node: &str, file: &str) -> Result<BackupEntity, ClientError> {
        let url = self.url(node, &format!("/backup/info/file/{}", file));
        let resp = self.client.get(&url).send().await;
        Self::decode(&url, resp).await
    }

    async fn file_list(&self, node: &str, dir: &str) -> Result<Vec<FInfo>, ClientError> {
        let url = self.url(node, &format!("/backup/filelist/dir/{}", dir));
        let resp = self.client.get(&url).send().await;
        Self::decode(&url, resp).await
    }

    async fn delete_backups(&self, node: &str, files: &[String]) -> Result<(), ClientError> {
        let url = self.url(node, "/backup/delete");
        let form: Vec<(&str, &str)> = files.iter().map(|f| ("files", f.as_str())).collect();
        let resp = self.client.post(&url).form(&form).send().await;
        Self::decode::<serde_json::Value>(&url, resp).await.map(|_| ())
    }

    async fn recover(
        &self,
        node: &str,
        file: &str,
        req: &RecoverRequest,
    ) -> Result<String, ClientError> {
        let url = self.url(node, &format!("/backup/full/recover/file/{}", file));
        let resp = self.client.post(&url).form(&Self::recover_form(req)).send().await;
        let reply: OnceReply = Self::decode(&url, resp).await?;
        Ok(reply.rid)
    }

    async fn recover_increment(
        &self,
        node: &str,
        dir: &str,
        req: &RecoverRequest,
    ) -> Result<String, ClientError> {
        let url = self.url(node, &format!("/backup/increment/recover/dir/{}", dir));
        let resp = self.client.post(&url).form(&Self::recover_form(req)).send().await;
        let reply: OnceReply = Self::decode(&url, resp).await?;
        Ok(reply.rid)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! In-memory daemon client for tests.
    #![allow(clippy::unwrap_used)]

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        /// node → (jobs, version) pushed by set_cron_jobs
        pushed: HashMap<String, (Vec<Job>, String)>,
        notify: HashMap<String, String>,
        debug: HashMap<String, DebugInfo>,
        backups: HashMap<String, Vec<BackupEntity>>,
        file_lists: HashMap<String, Vec<FInfo>>,
        recovers: Vec<(String, String, RecoverRequest)>,
        deletes: Vec<(String, Vec<String>)>,
        fail_nodes: Vec<String>,
    }

    /// Daemon client whose responses come from per-node fixtures.
    #[derive(Clone, Default)]
    pub struct FakeDaemonClient {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeDaemonClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pushed_jobs(&self, node: &str) -> Option<(Vec<Job>, String)> {
            self.state.lock().pushed.get(node).cloned()
        }

        pub fn pushed_nodes(&self) -> Vec<String> {
            let mut nodes: Vec<String> = self.state.lock().pushed.keys().cloned().collect();
            nodes.sort();
            nodes
        }

        pub fn notify_addr(&self, node: &str) -> Option<String> {
            self.state.lock().notify.get(node).cloned()
        }

        pub fn recovers(&self) -> Vec<(String, String, RecoverRequest)> {
            self.state.lock().recovers.clone()
        }

        pub fn deletes(&self) -> Vec<(String, Vec<String>)> {
            self.state.lock().deletes.clone()
        }

        pub fn set_debug(&self, node: &str, info: DebugInfo) {
            self.state.lock().debug.insert(node.to_string(), info);
        }

        pub fn set_backups(&self, node: &str, entities: Vec<BackupEntity>) {
            self.state.lock().backups.insert(node.to_string(), entities);
        }

        pub fn set_file_list(&self, node: &str, infos: Vec<FInfo>) {
            self.state.lock().file_lists.insert(node.to_string(), infos);
        }

        /// Make every call against `node` fail with a transport error.
        pub fn fail_node(&self, node: &str) {
            self.state.lock().fail_nodes.push(node.to_string());
        }

        pub fn clear_pushed(&self) {
            self.state.lock().pushed.clear();
        }

        fn check(&self, node: &str) -> Result<(), ClientError> {
            if self.state.lock().fail_nodes.iter().any(|n| n == node) {
                return Err(ClientError::Transport {
                    url: format!("http://{}:9002", node),
                    detail: "connection refused".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DaemonClient for FakeDaemonClient {
        async fn set_cron_jobs(&self, node: &str, jobs: &[Job]) -> Result<(), ClientError> {
            self.check(node)?;
            let data = serde_json::to_string(jobs).unwrap();
            let version = jobs_version(&data);
            self.state.lock().pushed.insert(node.to_string(), (jobs.to_vec(), version));
            Ok(())
        }

        async fn set_notify(&self, node: &str, addr: &str) -> Result<(), ClientError> {
            self.check(node)?;
            self.state.lock().notify.insert(node.to_string(), addr.to_string());
            Ok(())
        }

        async fn debug(&self, node: &str) -> Result<DebugInfo, ClientError> {
            self.check(node)?;
            self.state.lock().debug.get(node).cloned().ok_or_else(|| ClientError::Status {
                status: 404,
                body: "no debug fixture".into(),
            })
        }

        async fn get_cron_jobs(
            &self,
            node: &str,
            query: &HashMap<String, String>,
        ) -> Result<Vec<EntrySpec>, ClientError> {
            self.check(node)?;
            let state = self.state.lock();
            let jobs = state.pushed.get(node).map(|(jobs, _)| jobs.clone()).unwrap_or_default();
            Ok(jobs
                .into_iter()
                .filter(|j| j.matches(query))
                .map(|job| EntrySpec { prev: None, next: None, job })
                .collect())
        }

        async fn get_cron_job(&self, node: &str, id: &str) -> Result<Job, ClientError> {
            self.check(node)?;
            let state = self.state.lock();
            state
                .pushed
                .get(node)
                .and_then(|(jobs, _)| jobs.iter().find(|j| j.id == id).cloned())
                .ok_or_else(|| ClientError::Status { status: 400, body: "job not found".into() })
        }

        async fn cron_once(&self, node: &str, id: &str) -> Result<String, ClientError> {
            self.check(node)?;
            Ok(format!("rid-{}-{}", node, id))
        }

        async fn cron_action(
            &self,
            node: &str,
            id: &str,
            action: &str,
        ) -> Result<String, ClientError> {
            self.check(node)?;
            if action == "run" {
                return Ok(format!("rid-{}-{}", node, id));
            }
            Ok("OK".to_string())
        }

        async fn get_backups(
            &self,
            node: &str,
            _dirs: &[String],
        ) -> Result<Vec<BackupEntity>, ClientError> {
            self.check(node)?;
            Ok(self.state.lock().backups.get(node).cloned().unwrap_or_default())
        }

        async fn backup_info(&self, node: &str, file: &str) -> Result<BackupEntity, ClientError> {
            self.check(node)?;
            self.state
                .lock()
                .backups
                .get(node)
                .and_then(|ents| ents.iter().find(|e| e.name == file).cloned())
                .ok_or_else(|| ClientError::Status { status: 503, body: "not found".into() })
        }

        async fn file_list(&self, node: &str, _dir: &str) -> Result<Vec<FInfo>, ClientError> {
            self.check(node)?;
            Ok(self.state.lock().file_lists.get(node).cloned().unwrap_or_default())
        }

        async fn delete_backups(&self, node: &str, files: &[String]) -> Result<(), ClientError> {
            self.check(node)?;
            self.state.lock().deletes.push((node.to_string(), files.to_vec()));
            Ok(())
        }

        async fn recover(
            &self,
            node: &str,
            file: &str,
            req: &RecoverRequest,
        ) -> Result<String, ClientError> {
            self.check(node)?;
            self.state.lock().recovers.push((node.to_string(), file.to_string(), req.clone()));
            Ok(format!("rid-{}-{}", node, file))
        }

        async fn recover_increment(
            &self,
            node: &str,
            dir: &str,
            req: &RecoverRequest,
        ) -> Result<String, ClientError> {
            self.check(node)?;
            self.state.lock().recovers.push((node.to_string(), dir.to_string(), req.clone()));
            Ok(format!("rid-{}-{}", node, dir))
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
