//! Durable last-kill ledger.
//!
//! One timestamp per monster identity. A scraped batch overwrites per identity
//! with the first row encountered in page order, and the result is written to
//! disk before it becomes visible in memory.

use crate::models::{KillRow, LastKillsMap, MonsterIdentity};
use crate::store::{JsonStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

pub const LEDGER_FILE: &str = "last_kills.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastKillRecord {
    #[serde(flatten)]
    identity: MonsterIdentity,
    last_kill: DateTime<Utc>,
}

/// Outcome of a ledger update, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub inserted: usize,
    pub changed: usize,
    pub unchanged: usize,
}

pub struct KillLedger {
    entries: LastKillsMap,
    store: JsonStore<Vec<LastKillRecord>>,
}

impl KillLedger {
    /// Loads the ledger from `path`, falling back to an empty one.
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let store: JsonStore<Vec<LastKillRecord>> = JsonStore::new(path);
        let entries: LastKillsMap = store
            .load_or_default()
            .into_iter()
            .map(|r: LastKillRecord| (r.identity, r.last_kill))
            .collect();
        info!(
            path = %store.path().display(),
            entries = entries.len(),
            "kill ledger loaded"
        );
        Self { entries, store }
    }

    pub fn entries(&self) -> &LastKillsMap {
        &self.entries
    }

    pub fn get(&self, identity: &MonsterIdentity) -> Option<DateTime<Utc>> {
        self.entries.get(identity).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a scraped batch. Rows are taken in the order given; only the
    /// first row per identity counts, and it replaces the stored value
    /// unconditionally. Nothing changes in memory if persisting fails.
    pub fn update(&mut self, rows: &[KillRow]) -> Result<LedgerUpdate, StoreError> {
        let mut next = self.entries.clone();
        let mut seen = HashSet::new();
        let mut outcome = LedgerUpdate::default();

        for row in rows {
            let identity = row.identity();
            if !seen.insert(identity.clone()) {
                continue;
            }
            match next.insert(identity, row.killed_at) {
                None => outcome.inserted += 1,
                Some(previous) if previous != row.killed_at => outcome.changed += 1,
                Some(_) => outcome.unchanged += 1,
            }
        }

        self.store.save(&Self::records(&next))?;
        self.entries = next;

        debug!(
            inserted = outcome.inserted,
            changed = outcome.changed,
            unchanged = outcome.unchanged,
            "kill ledger updated"
        );
        Ok(outcome)
    }

    /// Writes the current state again (used on shutdown).
    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.save(&Self::records(&self.entries))
    }

    fn records(entries: &LastKillsMap) -> Vec<LastKillRecord> {
        entries
            .iter()
            .map(|(identity, last_kill)| LastKillRecord {
                identity: identity.clone(),
                last_kill: *last_kill,
            })
            .collect()
    }
}
