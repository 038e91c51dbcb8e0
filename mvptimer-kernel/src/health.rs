/*!
 * Engine health counters.
 *
 * ROLE: counts successful and failed cycles and remembers the last outcome,
 * served as JSON on `GET /status`.
 *
 * ARCHITECTURE: the tracker is a cheap clone over atomics and a shared
 * status slot; the cycle runner writes it, the HTTP handlers read it.
 */

use crate::state::{new_state, Shared};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub ledger_entries: usize,
    pub cached_windows: usize,
    pub timers: usize,
}

#[derive(Debug, Default)]
struct CycleStatus {
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    ledger_entries: usize,
    cached_windows: usize,
    timers: usize,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    cycles_ok: Arc<AtomicU64>,
    cycles_failed: Arc<AtomicU64>,
    status: Shared<CycleStatus>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles_ok: Arc::new(AtomicU64::new(0)),
            cycles_failed: Arc::new(AtomicU64::new(0)),
            status: new_state(CycleStatus::default()),
        }
    }

    pub fn record_success(&self, ledger_entries: usize, cached_windows: usize, timers: usize) {
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        let mut status = self.status.lock();
        status.last_success = Some(Utc::now());
        status.last_error = None;
        status.ledger_entries = ledger_entries;
        status.cached_windows = cached_windows;
        status.timers = timers;
    }

    /// Counters from the previous success are left as they were.
    pub fn record_failure(&self, error: &str) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        self.status.lock().last_error = Some(error.to_string());
    }

    pub fn get_health(&self) -> KernelHealth {
        let status = self.status.lock();
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            last_success: status.last_success,
            last_error: status.last_error.clone(),
            ledger_entries: status.ledger_entries,
            cached_windows: status.cached_windows,
            timers: status.timers,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
