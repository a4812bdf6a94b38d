// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup execution: full archives, incremental rsync, recovery with
//! rollback, and expiry sweeps, registered as scheduler task functions.

mod archive;
pub(crate) mod exec;
mod recover;
mod slots;
mod task;

pub use exec::{ContainerExec, ExecError, NsenterExec, APP_ROOT};
pub use slots::{BackupSlots, SlotBusy, SlotGuard, SlotState};
pub use task::register_tasks;

use bakd_core::{Clock, SystemClock};
use bakd_storage::{Driver, DriverError, Meta, MetaError};
use std::sync::Arc;
use thiserror::Error;

pub const BACKUP_ACTION: &str = "backup";
pub const EXPIRE_ACTION: &str = "backup_expire";
pub const RECOVER_ACTION: &str = "backup_recover";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("directory {0} not exist")]
    MissingSource(String),

    #[error(transparent)]
    Slot(#[from] SlotBusy),

    #[error("{hook} {script} in {container} run failed: {source}")]
    Hook {
        hook: &'static str,
        script: String,
        container: String,
        source: ExecError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("archive pipeline missing {0} pipe")]
    Pipe(&'static str),

    #[error("tar exited {status}: {stderr}")]
    Tar { status: String, stderr: String },

    #[error("rsync {src} to {dest} failed: {detail}")]
    CloneDir { src: String, dest: String, detail: String },

    #[error("empty recover file")]
    EmptyRecoverFile,

    #[error("unknown backup file {file} in {namespace}")]
    UnknownBackup { file: String, namespace: String },

    /// Last-resort rollback rename failed; the node's filesystem needs
    /// manual attention before another recover is attempted.
    #[error("fatal: fail to rename {from} to {to}: {detail}")]
    RenameFatal { from: String, to: String, detail: String },
}

/// Everything the backup tasks need from the daemon, passed by
/// reference into the registered closures.
pub struct BackupContext<C: Clock = SystemClock> {
    pub driver: Arc<dyn Driver>,
    pub meta: Arc<Meta>,
    pub slots: BackupSlots,
    pub exec: Arc<dyn ContainerExec>,
    /// The node's IPv4; doubles as the storage namespace.
    pub namespace: String,
    pub clock: C,
}

impl<C: Clock> BackupContext<C> {
    pub fn new(
        driver: Arc<dyn Driver>,
        meta: Arc<Meta>,
        exec: Arc<dyn ContainerExec>,
        namespace: impl Into<String>,
        clock: C,
    ) -> Arc<Self> {
        Arc::new(Self {
            driver,
            meta,
            slots: BackupSlots::new(),
            exec,
            namespace: namespace.into(),
            clock,
        })
    }
}
