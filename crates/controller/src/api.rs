// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed handlers for the controller's record sink and record queries.
//!
//! Daemons POST job records to the advertised notify URL; these
//! handlers file them into the monthly store and answer queries. The
//! HTTP router mounting them is external.

use bakd_core::JobRecord;
use bakd_storage::{RecordError, RecordStore};
use std::path::Path;
use thiserror::Error;

/// Expiry sweep records are filed under the controller's own app name;
/// they carry no per-app context of their own.
pub const EXPIRE_RECORD_APP: &str = "backupctl";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Record(RecordError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound => 404,
            ApiError::Record(_) => 500,
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound => ApiError::NotFound,
            other => ApiError::Record(other),
        }
    }
}

/// Record sink and query surface.
pub struct RecordApi<'a> {
    store: &'a RecordStore,
}

impl<'a> RecordApi<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// The app bucket a record files under.
    pub fn record_app(record: &JobRecord) -> String {
        if record.job.action == "backup_expire" {
            return EXPIRE_RECORD_APP.to_string();
        }
        record.job.args.str("app", "")
    }

    /// Notify sink: persist one record from a daemon.
    pub fn notify(&self, record: &JobRecord) -> Result<(), ApiError> {
        let app = Self::record_app(record);
        tracing::debug!(%app, rid = %record.rid, state = %record.state, "put record");
        self.store.put(&app, record)?;
        Ok(())
    }

    pub fn records(
        &self,
        app: &str,
        total: usize,
        month: u32,
        year: i32,
    ) -> Result<Vec<JobRecord>, ApiError> {
        Ok(self.store.get(app, total, month, year)?)
    }

    pub fn record_by_id(&self, app: &str, rid: &str) -> Result<JobRecord, ApiError> {
        Ok(self.store.get_by_id(app, rid)?)
    }

    /// Copy the store's partitions aside; rejected while one is running.
    pub fn backup_store(&self, dir: &str) -> Result<(), ApiError> {
        if dir.is_empty() {
            return Err(ApiError::Validation("dir is empty".into()));
        }
        Ok(self.store.backup(Path::new(dir))?)
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
