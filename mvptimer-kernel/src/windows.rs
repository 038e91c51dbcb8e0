//! Respawn window resolution with a persistent cache in front of the mob db.
//!
//! Concrete windows are cached forever and written to disk. An unknown window
//! is never cached: the next call looks it up again.

use crate::models::{RespawnWindow, WindowKey, WindowsMap};
use crate::source::WindowLookup;
use crate::store::{JsonStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const WINDOWS_FILE: &str = "respawn_windows.json";

/// Synchronous view over known windows, as consumed by the classifier.
pub trait WindowSource {
    fn window(&self, key: &WindowKey) -> Option<RespawnWindow>;
}

impl WindowSource for WindowsMap {
    fn window(&self, key: &WindowKey) -> Option<RespawnWindow> {
        self.get(key).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WindowRecord {
    monster_id: String,
    map_name: String,
    min_minutes: u32,
    max_minutes: u32,
}

pub struct WindowCache {
    entries: WindowsMap,
    store: JsonStore<Vec<WindowRecord>>,
}

impl WindowCache {
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let store: JsonStore<Vec<WindowRecord>> = JsonStore::new(path);
        let mut entries = WindowsMap::new();
        for record in store.load_or_default() {
            match RespawnWindow::new(record.min_minutes, record.max_minutes) {
                Some(window) => {
                    entries.insert(WindowKey::new(record.monster_id, record.map_name), window);
                }
                None => warn!(
                    monster_id = %record.monster_id,
                    map = %record.map_name,
                    "dropping cached window with min > max"
                ),
            }
        }
        info!(
            path = %store.path().display(),
            entries = entries.len(),
            "respawn window cache loaded"
        );
        Self { entries, store }
    }

    pub fn get(&self, key: &WindowKey) -> Option<RespawnWindow> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts and persists. The entry stays in memory even if the write fails.
    pub fn insert(&mut self, key: WindowKey, window: RespawnWindow) -> Result<(), StoreError> {
        self.entries.insert(key, window);
        self.flush()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let records: Vec<WindowRecord> = self
            .entries
            .iter()
            .map(|(key, window)| WindowRecord {
                monster_id: key.monster_id.clone(),
                map_name: key.map_name.clone(),
                min_minutes: window.min_minutes(),
                max_minutes: window.max_minutes(),
            })
            .collect();
        self.store.save(&records)
    }
}

impl WindowSource for WindowCache {
    fn window(&self, key: &WindowKey) -> Option<RespawnWindow> {
        self.get(key)
    }
}

pub struct WindowResolver {
    cache: WindowCache,
    lookup: Box<dyn WindowLookup>,
}

impl WindowResolver {
    pub fn new(cache: WindowCache, lookup: Box<dyn WindowLookup>) -> Self {
        Self { cache, lookup }
    }

    pub fn cache(&self) -> &WindowCache {
        &self.cache
    }

    /// Cache hit returns without any external call. Lookup failures and
    /// malformed responses count as unknown.
    pub async fn resolve(&mut self, key: &WindowKey) -> Option<RespawnWindow> {
        if let Some(window) = self.cache.get(key) {
            return Some(window);
        }

        match self.lookup.lookup_window(&key.monster_id, &key.map_name).await {
            Ok(Some(window)) => {
                if let Err(e) = self.cache.insert(key.clone(), window) {
                    warn!(error = %e, "failed to persist respawn window cache");
                }
                info!(
                    monster_id = %key.monster_id,
                    map = %key.map_name,
                    min = window.min_minutes(),
                    max = window.max_minutes(),
                    "respawn window resolved"
                );
                Some(window)
            }
            Ok(None) => {
                debug!(monster_id = %key.monster_id, map = %key.map_name, "respawn window unknown");
                None
            }
            Err(e) => {
                warn!(
                    monster_id = %key.monster_id,
                    map = %key.map_name,
                    error = %e,
                    "respawn window lookup failed, treating as unknown"
                );
                None
            }
        }
    }

    /// Resolves every distinct key and returns the known windows.
    pub async fn resolve_all<I>(&mut self, keys: I) -> WindowsMap
    where
        I: IntoIterator<Item = WindowKey>,
    {
        let keys: BTreeSet<WindowKey> = keys.into_iter().collect();
        let mut resolved = WindowsMap::new();
        for key in keys {
            if let Some(window) = self.resolve(&key).await {
                resolved.insert(key, window);
            }
        }
        resolved
    }
}
