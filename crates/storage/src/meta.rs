// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-namespace catalogue of backup entities.
//!
//! The whole map round-trips with the driver as one JSON blob at
//! `<namespace>/.meta`. The invariant after any successful mutator +
//! `sync()` pair is that the remote blob matches in-memory state.

use crate::driver::{Driver, DriverError};
use bakd_core::{BackupEntity, INCREMENT_SUFFIX};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

pub const META_FILE: &str = ".meta";

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("fail to sync meta file: {0}")]
    Sync(#[source] DriverError),

    #[error("fail to download meta file: {0}")]
    Load(#[source] DriverError),

    /// Fatal: the remote blob cannot be decoded and must be repaired by
    /// hand before the daemon can start.
    #[error("corrupt meta file in namespace {namespace}: {detail}")]
    Corrupt { namespace: String, detail: String },

    #[error("meta encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct Meta {
    entities: Mutex<IndexMap<String, Vec<BackupEntity>>>,
    driver: Arc<dyn Driver>,
    namespace: String,
    /// Held across driver uploads and taken by graceful release so an
    /// in-flight sync finishes before shutdown.
    stop_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Meta {
    pub fn new(driver: Arc<dyn Driver>, namespace: impl Into<String>) -> Self {
        Self {
            entities: Mutex::new(IndexMap::new()),
            driver,
            namespace: namespace.into(),
            stop_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn stop_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.stop_lock)
    }

    /// Append an entity under its source key.
    pub fn add(&self, ent: BackupEntity) {
        self.entities.lock().entry(ent.source.clone()).or_default().push(ent);
    }

    /// Replace the whole list under a key (incremental backups keep
    /// exactly one entity per source).
    pub fn set(&self, src: &str, ents: Vec<BackupEntity>) {
        self.entities.lock().insert(src.to_string(), ents);
    }

    /// Linear scan by entity name.
    pub fn get(&self, name: &str) -> Option<BackupEntity> {
        self.entities
            .lock()
            .values()
            .flatten()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Remove the first entity matching `name` from its list.
    pub fn delete(&self, name: &str) {
        let mut entities = self.entities.lock();
        for list in entities.values_mut() {
            if let Some(idx) = list.iter().position(|e| e.name == name) {
                list.remove(idx);
                return;
            }
        }
    }

    /// Full and `@increment` lists for each given source, concatenated;
    /// with no sources, the flattened whole map.
    pub fn array(&self, sources: &[String]) -> Vec<BackupEntity> {
        let entities = self.entities.lock();
        if sources.is_empty() {
            return entities.values().flatten().cloned().collect();
        }
        let mut ret = Vec::new();
        for src in sources {
            if let Some(list) = entities.get(src) {
                ret.extend(list.iter().cloned());
            }
            if let Some(list) = entities.get(&format!("{}{}", src, INCREMENT_SUFFIX)) {
                ret.extend(list.iter().cloned());
            }
        }
        ret
    }

    /// Serialize the whole map and upload it to `<namespace>/.meta`.
    pub async fn sync(&self) -> Result<(), MetaError> {
        let content = serde_json::to_vec(&*self.entities.lock())?;
        let _stop = self.stop_lock.lock().await;
        let mut reader: &[u8] = &content;
        self.driver
            .upload(&mut reader, &format!("{}/{}", self.namespace, META_FILE))
            .await
            .map_err(MetaError::Sync)
    }

    /// Replace in-memory state from the remote blob.
    ///
    /// A missing blob loads as missing (callers warn and continue with an
    /// empty map); a present-but-undecodable blob is fatal.
    pub async fn load_from_backend(&self) -> Result<(), MetaError> {
        let mut buf: Vec<u8> = Vec::new();
        self.driver
            .download(&mut buf, &format!("{}/{}", self.namespace, META_FILE))
            .await
            .map_err(MetaError::Load)?;
        // Some shared filesystems pad short reads with NULs.
        while buf.last() == Some(&0) {
            buf.pop();
        }
        let parsed: IndexMap<String, Vec<BackupEntity>> =
            serde_json::from_slice(&buf).map_err(|e| MetaError::Corrupt {
                namespace: self.namespace.clone(),
                detail: e.to_string(),
            })?;
        *self.entities.lock() = parsed;
        Ok(())
    }

    /// Remove a backup from the catalogue and then from the backend.
    ///
    /// The remote delete is best-effort: once the entity is out of the
    /// meta it no longer exists as far as callers are concerned.
    pub async fn delete_backup(&self, name: &str) -> Result<(), MetaError> {
        self.delete(name);
        self.sync().await?;
        tracing::info!(name, "deleting backup");
        if let Err(e) = self.driver.delete(&format!("{}/{}", self.namespace, name)).await {
            tracing::error!(name, error = %e, "fail to delete backup file in backend");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
