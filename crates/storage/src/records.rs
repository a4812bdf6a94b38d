// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-mostly persistence of job records, partitioned by year-month.
//!
//! One embedded database file per month (`records<YYYYMM>.db`), one table
//! per app inside it, keyed by record id. Partitions open lazily and
//! reads for a missing month return empty. Cross-month id lookup scans
//! already-opened partitions only.

use bakd_core::{JobRecord, RecordState};
use chrono::{Datelike, Utc};
use parking_lot::{Mutex, RwLock};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record id is empty")]
    EmptyRid,

    #[error("invalid record, start time is zero")]
    ZeroStart,

    #[error("record not found")]
    NotFound,

    #[error("record backup is already running")]
    BackupRunning,

    #[error("record database error: {0}")]
    Db(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("record encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RecordError {
    fn db(e: impl std::fmt::Display) -> Self {
        Self::Db(e.to_string())
    }
}

pub struct RecordStore {
    data_dir: PathBuf,
    dbs: Mutex<HashMap<u32, Arc<Database>>>,
    /// Backup takes the write side; every put takes the read side.
    gate: RwLock<()>,
    backuping: AtomicBool,
}

fn table_def(app: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(app)
}

fn partition_key(year: i32, month: u32) -> u32 {
    let now = Utc::now();
    let year = if year < 2015 { now.year() } else { year };
    let month = if !(1..=12).contains(&month) { now.month() } else { month };
    year as u32 * 100 + month
}

impl RecordStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            dbs: Mutex::new(HashMap::new()),
            gate: RwLock::new(()),
            backuping: AtomicBool::new(false),
        })
    }

    fn db_path(&self, key: u32) -> PathBuf {
        self.data_dir.join(format!("records{}.db", key))
    }

    fn open(&self, key: u32, create: bool) -> Result<Option<Arc<Database>>, RecordError> {
        let mut dbs = self.dbs.lock();
        if let Some(db) = dbs.get(&key) {
            return Ok(Some(Arc::clone(db)));
        }
        let path = self.db_path(key);
        if !create && !path.exists() {
            return Ok(None);
        }
        let db = Arc::new(Database::create(&path).map_err(RecordError::db)?);
        dbs.insert(key, Arc::clone(&db));
        Ok(Some(db))
    }

    /// Store one record under its app's table.
    ///
    /// A `running` record arriving after any value already exists at the
    /// same rid is dropped: terminal states never regress.
    pub fn put(&self, app: &str, record: &JobRecord) -> Result<(), RecordError> {
        if record.rid.is_empty() {
            return Err(RecordError::EmptyRid);
        }
        if record.start.timestamp() == 0 {
            return Err(RecordError::ZeroStart);
        }
        let _writes = self.gate.read();

        let key = partition_key(record.start.year(), record.start.month());
        let db = match self.open(key, true)? {
            Some(db) => db,
            None => return Err(RecordError::Db("partition open failed".into())),
        };
        let content = serde_json::to_vec(record)?;
        let txn = db.begin_write().map_err(RecordError::db)?;
        let stale = {
            let mut table = txn.open_table(table_def(app)).map_err(RecordError::db)?;
            let existing = table.get(record.rid.as_str()).map_err(RecordError::db)?.is_some();
            if existing && record.state == RecordState::Running {
                // Stale running arrived after the terminal record.
                true
            } else {
                table
                    .insert(record.rid.as_str(), content.as_slice())
                    .map_err(RecordError::db)?;
                false
            }
        };
        if stale {
            txn.abort().map_err(RecordError::db)?;
        } else {
            txn.commit().map_err(RecordError::db)?;
        }
        Ok(())
    }

    /// Newest-first records for an app, up to `total`. A month with no
    /// partition file yields an empty list, not an error; undecodable
    /// values are skipped.
    pub fn get(
        &self,
        app: &str,
        total: usize,
        month: u32,
        year: i32,
    ) -> Result<Vec<JobRecord>, RecordError> {
        let total = if total == 0 { 20 } else { total };
        let key = partition_key(year, month);
        let db = match self.open(key, false)? {
            Some(db) => db,
            None => return Ok(Vec::new()),
        };
        let txn = db.begin_read().map_err(RecordError::db)?;
        let table = match txn.open_table(table_def(app)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(RecordError::db(e)),
        };
        let mut records = Vec::with_capacity(total);
        for item in table.iter().map_err(RecordError::db)?.rev() {
            if records.len() >= total {
                break;
            }
            let (_, value) = item.map_err(RecordError::db)?;
            if let Ok(record) = serde_json::from_slice::<JobRecord>(value.value()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Scan already-opened partitions for a record id.
    pub fn get_by_id(&self, app: &str, rid: &str) -> Result<JobRecord, RecordError> {
        let dbs: Vec<Arc<Database>> = self.dbs.lock().values().cloned().collect();
        for db in dbs {
            let txn = db.begin_read().map_err(RecordError::db)?;
            let table = match txn.open_table(table_def(app)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => continue,
                Err(e) => return Err(RecordError::db(e)),
            };
            if let Some(value) = table.get(rid).map_err(RecordError::db)? {
                return Ok(serde_json::from_slice(value.value())?);
            }
        }
        Err(RecordError::NotFound)
    }

    /// Copy every partition file into `dest`. Mutually exclusive with all
    /// writes and with itself.
    pub fn backup(&self, dest: &Path) -> Result<(), RecordError> {
        if self.backuping.swap(true, Ordering::SeqCst) {
            return Err(RecordError::BackupRunning);
        }
        let ret = self.backup_locked(dest);
        self.backuping.store(false, Ordering::SeqCst);
        ret
    }

    fn backup_locked(&self, dest: &Path) -> Result<(), RecordError> {
        let _gate = self.gate.write();
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(key) = parse_partition_name(&name) else {
                continue;
            };
            // Opening the partition forces any pending writes to settle;
            // the gate keeps new ones out while the file is copied.
            if self.open(key, false)?.is_some() {
                std::fs::copy(entry.path(), dest.join(&name))?;
            }
        }
        Ok(())
    }

    /// Close all open partitions.
    pub fn release(&self) {
        self.dbs.lock().clear();
    }
}

/// `records<YYYYMM>.db` → `YYYYMM`.
fn parse_partition_name(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("records")?.strip_suffix(".db")?;
    if rest.len() != 6 {
        return None;
    }
    rest.parse().ok()
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
