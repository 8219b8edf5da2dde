//! # Override and Restart Bookkeeping
//!
//! Per-configuration records of environment overrides applied at load
//! time and of restart-flagged changes awaiting a restart. Both tables are
//! keyed by configuration id, then by path text.
//!
//! ## Design
//!
//! Validation works on a snapshot of one id's records and reports the
//! changes it wants as [`RecordChanges`]. The service commits them only
//! after the whole operation succeeded, so a rejected load or save leaves
//! the tables untouched. The lock is never held while validating.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use modcfg_core::ConfigurationId;
use parking_lot::Mutex;
use serde_json::Value;

/// An environment value substituted into a loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRecord {
    /// The applied value.
    pub value: Value,
    /// The document's own value before substitution, if it had one.
    pub prior: Option<Value>,
}

/// A restart-flagged change, with the value in effect before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRestart {
    pub baseline: Option<Value>,
}

/// One id's records, as seen by a validation pass.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    pub overrides: BTreeMap<String, OverrideRecord>,
    pub pending_restart: BTreeMap<String, PendingRestart>,
}

/// Record edits requested by a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
    pub set_overrides: Vec<(String, OverrideRecord)>,
    pub clear_overrides: Vec<String>,
    pub add_pending: Vec<(String, PendingRestart)>,
    pub clear_pending: Vec<String>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.set_overrides.is_empty()
            && self.clear_overrides.is_empty()
            && self.add_pending.is_empty()
            && self.clear_pending.is_empty()
    }
}

#[derive(Debug, Default)]
struct Tables {
    overrides: HashMap<ConfigurationId, BTreeMap<String, OverrideRecord>>,
    pending_restart: HashMap<ConfigurationId, BTreeMap<String, PendingRestart>>,
}

impl Tables {
    fn restart_pending(&self) -> bool {
        self.pending_restart.values().any(|paths| !paths.is_empty())
    }
}

/// Process-wide record tables.
#[derive(Debug, Default)]
pub struct Records {
    tables: Mutex<Tables>,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: ConfigurationId) -> RecordSnapshot {
        let tables = self.tables.lock();
        RecordSnapshot {
            overrides: tables.overrides.get(&id).cloned().unwrap_or_default(),
            pending_restart: tables.pending_restart.get(&id).cloned().unwrap_or_default(),
        }
    }

    /// Apply `changes` for `id`. Returns the new restart requirement when
    /// the pending set went from empty to non-empty or back.
    pub fn commit(&self, id: ConfigurationId, changes: RecordChanges) -> Option<bool> {
        if changes.is_empty() {
            return None;
        }
        let mut tables = self.tables.lock();
        let before = tables.restart_pending();

        let overrides = tables.overrides.entry(id).or_default();
        for path in changes.clear_overrides {
            overrides.remove(&path);
        }
        overrides.extend(changes.set_overrides);

        let pending = tables.pending_restart.entry(id).or_default();
        for path in changes.clear_pending {
            pending.remove(&path);
        }
        pending.extend(changes.add_pending);

        tables.overrides.retain(|_, paths| !paths.is_empty());
        tables.pending_restart.retain(|_, paths| !paths.is_empty());

        let after = tables.restart_pending();
        (before != after).then_some(after)
    }

    /// Move every record of `from` to `to`.
    pub fn rekey(&self, from: ConfigurationId, to: ConfigurationId) {
        let mut tables = self.tables.lock();
        if let Some(paths) = tables.overrides.remove(&from) {
            tables.overrides.insert(to, paths);
        }
        if let Some(paths) = tables.pending_restart.remove(&from) {
            tables.pending_restart.insert(to, paths);
        }
    }

    pub fn restart_pending(&self) -> bool {
        self.tables.lock().restart_pending()
    }

    pub fn restart_pending_for(&self) -> BTreeMap<ConfigurationId, BTreeSet<String>> {
        let tables = self.tables.lock();
        tables
            .pending_restart
            .iter()
            .map(|(id, paths)| (*id, paths.keys().cloned().collect()))
            .collect()
    }

    pub fn loaded_environment_variables(&self) -> BTreeMap<ConfigurationId, BTreeSet<String>> {
        let tables = self.tables.lock();
        tables
            .overrides
            .iter()
            .map(|(id, paths)| (*id, paths.keys().cloned().collect()))
            .collect()
    }
}
