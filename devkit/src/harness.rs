/*!
Test harness for the refresh engine.

Owns a temp data directory plus the stubs, and builds fresh engine instances
on top of them. Building a second cycle from the same harness behaves like
a process restart: state comes back only from the files on disk.
*/

use crate::fixtures::init_test_logging;
use crate::stubs::{StubScrapeSource, StubWindowLookup};
use mvptimer_kernel::cycle::{CycleRunner, RefreshCycle};
use mvptimer_kernel::health::HealthTracker;
use mvptimer_kernel::ledger::{KillLedger, LEDGER_FILE};
use mvptimer_kernel::state::{board_channel, BoardReceiver};
use mvptimer_kernel::windows::{WindowCache, WindowResolver, WINDOWS_FILE};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestHarness {
    pub source: StubScrapeSource,
    pub lookup: StubWindowLookup,
    pub max_stale_minutes: Option<f64>,
    data_dir: TempDir,
}

impl TestHarness {
    pub fn new(lookup: StubWindowLookup) -> Self {
        init_test_logging();
        let data_dir = tempfile::tempdir().unwrap_or_else(|e| panic!("temp dir: {e}"));
        Self {
            source: StubScrapeSource::new(),
            lookup,
            max_stale_minutes: None,
            data_dir,
        }
    }

    pub fn with_max_stale(mut self, minutes: f64) -> Self {
        self.max_stale_minutes = Some(minutes);
        self
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.path().join(LEDGER_FILE)
    }

    pub fn windows_path(&self) -> PathBuf {
        self.data_dir.path().join(WINDOWS_FILE)
    }

    /// Raw file contents, `None` while the file does not exist yet.
    pub fn read_file(&self, path: &Path) -> Option<Vec<u8>> {
        std::fs::read(path).ok()
    }

    /// A cycle loaded from the data directory, wired to the shared stubs.
    pub fn cycle(&self) -> RefreshCycle {
        let resolver = WindowResolver::new(
            WindowCache::load(self.windows_path()),
            Box::new(self.lookup.clone()),
        );
        RefreshCycle::new(
            Box::new(self.source.clone()),
            KillLedger::load(self.ledger_path()),
            resolver,
            self.max_stale_minutes,
        )
    }

    /// A runner around [`cycle`](Self::cycle) and the receiving end of its
    /// board channel.
    pub fn runner(&self) -> (CycleRunner, BoardReceiver) {
        let (boards, receiver) = board_channel();
        (CycleRunner::new(self.cycle(), boards, HealthTracker::new()), receiver)
    }
}
