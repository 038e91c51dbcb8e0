/*!
 * The refresh cycle: scrape, fold into the ledger, resolve windows, classify.
 *
 * ROLE: a cycle either completes and yields a fresh board, or fails and
 * leaves the ledger, the window cache and the last published board exactly
 * as they were.
 *
 * ARCHITECTURE: [`RefreshCycle`] owns the source, ledger and resolver.
 * [`CycleRunner`] wraps it in an async mutex shared by the periodic loop and
 * `POST /refresh`, so cycles never overlap, then records health and publishes
 * the board on the watch channel.
 */

use crate::classifier::classify;
use crate::health::HealthTracker;
use crate::ledger::{KillLedger, LedgerUpdate};
use crate::models::{KillRow, TimerBoard, WindowsMap};
use crate::source::{ScrapeSource, SourceError};
use crate::state::{BoardSender, ShutdownReceiver};
use crate::store::StoreError;
use crate::windows::WindowResolver;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("kill scrape failed after re-login: {0}")]
    Scrape(#[source] SourceError),
    #[error("failed to persist kill ledger: {0}")]
    Persist(#[from] StoreError),
}

pub struct RefreshCycle {
    source: Box<dyn ScrapeSource>,
    ledger: KillLedger,
    resolver: WindowResolver,
    max_stale_minutes: Option<f64>,
}

impl RefreshCycle {
    pub fn new(
        source: Box<dyn ScrapeSource>,
        ledger: KillLedger,
        resolver: WindowResolver,
        max_stale_minutes: Option<f64>,
    ) -> Self {
        Self {
            source,
            ledger,
            resolver,
            max_stale_minutes,
        }
    }

    pub fn ledger(&self) -> &KillLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &WindowResolver {
        &self.resolver
    }

    /// Runs one cycle, classifying against the wall clock once windows are
    /// resolved.
    pub async fn run_cycle(&mut self) -> Result<TimerBoard, CycleError> {
        let windows = self.prepare().await?;
        Ok(self.classify_at(Utc::now(), &windows))
    }

    /// Same as [`run_cycle`](Self::run_cycle) with a fixed classification time.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<TimerBoard, CycleError> {
        let windows = self.prepare().await?;
        Ok(self.classify_at(now, &windows))
    }

    async fn prepare(&mut self) -> Result<WindowsMap, CycleError> {
        let rows = self.fetch_with_retry().await.map_err(CycleError::Scrape)?;
        let LedgerUpdate {
            inserted,
            changed,
            unchanged,
        } = self.ledger.update(&rows)?;
        debug!(rows = rows.len(), inserted, changed, unchanged, "ledger updated");

        // Stale identities are resolved too so the cache stays warm.
        let keys: Vec<_> = self.ledger.entries().keys().map(|id| id.window_key()).collect();
        Ok(self.resolver.resolve_all(keys).await)
    }

    fn classify_at(&self, now: DateTime<Utc>, windows: &WindowsMap) -> TimerBoard {
        classify(now, self.ledger.entries(), windows, self.max_stale_minutes)
    }

    async fn fetch_with_retry(&self) -> Result<Vec<KillRow>, SourceError> {
        match self.source.fetch_kill_rows().await {
            Ok(rows) => Ok(rows),
            Err(first) => {
                warn!(error = %first, "kill scrape failed, logging in again");
                if let Err(e) = self.source.reauthenticate().await {
                    warn!(error = %e, "re-login failed");
                }
                self.source.fetch_kill_rows().await
            }
        }
    }

    /// Logs out and flushes both stores.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.source.close().await {
            warn!(error = %e, "logout failed");
        }
        if let Err(e) = self.ledger.flush() {
            error!(error = %e, "failed to flush kill ledger");
        }
        if let Err(e) = self.resolver.cache().flush() {
            error!(error = %e, "failed to flush window cache");
        }
    }
}

/// Drives a [`RefreshCycle`] and publishes each successful board.
#[derive(Clone)]
pub struct CycleRunner {
    cycle: Arc<Mutex<RefreshCycle>>,
    boards: Arc<BoardSender>,
    health: HealthTracker,
}

impl CycleRunner {
    pub fn new(cycle: RefreshCycle, boards: BoardSender, health: HealthTracker) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(cycle)),
            boards: Arc::new(boards),
            health,
        }
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Waits for any cycle in flight, then runs one. Returns the timer count.
    pub async fn run_once(&self) -> Result<usize, CycleError> {
        let mut cycle = self.cycle.lock().await;
        self.execute(&mut cycle).await
    }

    /// Runs a cycle unless one is already in flight, in which case `None`.
    pub async fn try_run(&self) -> Option<Result<usize, CycleError>> {
        let mut cycle = self.cycle.try_lock().ok()?;
        Some(self.execute(&mut cycle).await)
    }

    async fn execute(&self, cycle: &mut RefreshCycle) -> Result<usize, CycleError> {
        match cycle.run_cycle().await {
            Ok(board) => {
                let timers = board.len();
                self.health.record_success(
                    cycle.ledger().len(),
                    cycle.resolver().cache().len(),
                    timers,
                );
                self.boards.send_replace(Some(Arc::new(board)));
                info!(timers, "timers refreshed");
                Ok(timers)
            }
            Err(e) => {
                error!(error = %e, "refresh cycle failed, keeping previous timers");
                self.health.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Ticks every `period` until shutdown, then closes the source. The first
    /// cycle runs immediately.
    pub async fn run_periodic(self, period: Duration, mut shutdown: ShutdownReceiver) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.run_once().await;
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("refresh loop stopping");
        self.cycle.lock().await.shutdown().await;
    }

    pub fn spawn_periodic(
        self,
        period: Duration,
        shutdown: ShutdownReceiver,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run_periodic(period, shutdown))
    }
}
