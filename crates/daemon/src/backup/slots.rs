// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path mutual exclusion between backup and recover.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Free,
    Backuping,
    Recovering,
}

bakd_core::simple_display! {
    SlotState {
        Free => "free",
        Backuping => "backuping",
        Recovering => "recovering",
    }
}

#[derive(Debug, Error)]
#[error("directory is now {state}, give up")]
pub struct SlotBusy {
    pub path: String,
    pub state: SlotState,
}

/// Table of per-path slots. Transitions only go through `free`; the
/// busy check and the set happen under one lock.
#[derive(Clone, Default)]
pub struct BackupSlots {
    stats: Arc<Mutex<HashMap<String, SlotState>>>,
}

impl BackupSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `path`, releasing it when the guard drops.
    pub fn acquire(&self, path: &str, state: SlotState) -> Result<SlotGuard, SlotBusy> {
        let mut stats = self.stats.lock();
        if let Some(current) = stats.get(path) {
            if *current != SlotState::Free {
                return Err(SlotBusy { path: path.to_string(), state: *current });
            }
        }
        stats.insert(path.to_string(), state);
        Ok(SlotGuard { stats: Arc::clone(&self.stats), path: path.to_string() })
    }

    pub fn state(&self, path: &str) -> SlotState {
        self.stats.lock().get(path).copied().unwrap_or_default()
    }
}

/// Releases the slot on all exit paths.
#[derive(Debug)]
pub struct SlotGuard {
    stats: Arc<Mutex<HashMap<String, SlotState>>>,
    path: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.stats.lock().insert(self.path.clone(), SlotState::Free);
    }
}

#[cfg(test)]
#[path = "slots_tests.rs"]
mod tests;
