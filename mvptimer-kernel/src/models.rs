/*!
 * Domain types shared by every layer.
 *
 * ROLE: monster identities, scraped kill rows, respawn windows and the
 * classified timer board.
 *
 * ARCHITECTURE: plain data with serde derives. Keys order deterministically
 * so persisted maps and rendered boards are stable across runs.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One trackable spawn: a monster species on a given map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonsterIdentity {
    pub monster_name: String,
    pub monster_id: String,
    pub map_name: String,
}

impl MonsterIdentity {
    pub fn new(
        monster_name: impl Into<String>,
        monster_id: impl Into<String>,
        map_name: impl Into<String>,
    ) -> Self {
        Self {
            monster_name: monster_name.into(),
            monster_id: monster_id.into(),
            map_name: map_name.into(),
        }
    }

    /// Respawn windows are shared by every name variant of the same id on a map.
    pub fn window_key(&self) -> WindowKey {
        WindowKey {
            monster_id: self.monster_id.clone(),
            map_name: self.map_name.clone(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.monster_name, self.map_name)
    }
}

/// A kill observation as scraped from the ranking page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRow {
    pub monster_name: String,
    pub monster_id: String,
    pub map_name: String,
    pub killed_at: DateTime<Utc>,
    pub player: Option<String>,
}

impl KillRow {
    pub fn identity(&self) -> MonsterIdentity {
        MonsterIdentity::new(&self.monster_name, &self.monster_id, &self.map_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowKey {
    pub monster_id: String,
    pub map_name: String,
}

impl WindowKey {
    pub fn new(monster_id: impl Into<String>, map_name: impl Into<String>) -> Self {
        Self {
            monster_id: monster_id.into(),
            map_name: map_name.into(),
        }
    }
}

/// Minimum and maximum delay, in minutes, between a kill and the respawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RespawnWindow {
    min_minutes: u32,
    max_minutes: u32,
}

impl RespawnWindow {
    /// Returns `None` when `min > max`.
    pub fn new(min_minutes: u32, max_minutes: u32) -> Option<Self> {
        (min_minutes <= max_minutes).then_some(Self { min_minutes, max_minutes })
    }

    pub fn fixed(minutes: u32) -> Self {
        Self {
            min_minutes: minutes,
            max_minutes: minutes,
        }
    }

    pub fn min_minutes(&self) -> u32 {
        self.min_minutes
    }

    pub fn max_minutes(&self) -> u32 {
        self.max_minutes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Window fully elapsed.
    Spawned,
    /// Window currently open.
    Spawning,
    /// Window not reached yet.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry {
    /// Window close for spawned/spawning timers, window open for pending ones.
    pub anchor: DateTime<Utc>,
    /// Signed minutes relative to the anchor (negative = not reached yet).
    pub magnitude_minutes: f64,
    pub label: String,
}

/// Snapshot handed to presentation once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerBoard {
    pub generated_at: DateTime<Utc>,
    pub spawned: Vec<TimerEntry>,
    pub spawning: Vec<TimerEntry>,
    pub pending: Vec<TimerEntry>,
}

impl TimerBoard {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            spawned: Vec::new(),
            spawning: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn bucket(&self, status: TimerStatus) -> &[TimerEntry] {
        match status {
            TimerStatus::Spawned => &self.spawned,
            TimerStatus::Spawning => &self.spawning,
            TimerStatus::Pending => &self.pending,
        }
    }

    pub fn len(&self) -> usize {
        self.spawned.len() + self.spawning.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type LastKillsMap = BTreeMap<MonsterIdentity, DateTime<Utc>>;
pub type WindowsMap = BTreeMap<WindowKey, RespawnWindow>;
