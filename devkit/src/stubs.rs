/*!
Stand-ins for the external collaborators.

Every stub is a cheap handle over shared state: clone it, box one copy into
the engine and keep the other to script responses and inspect calls.
*/

use async_trait::async_trait;
use mvptimer_kernel::models::{KillRow, RespawnWindow, TimerBoard, TimerStatus};
use mvptimer_kernel::sinks::{PresentationSink, SinkError};
use mvptimer_kernel::source::{ScrapeSource, SourceError, WindowLookup};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

enum Scripted {
    Rows(Vec<KillRow>),
    Failure(String),
}

#[derive(Default)]
struct SourceInner {
    script: Mutex<VecDeque<Scripted>>,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
    fetches: AtomicUsize,
    reauths: AtomicUsize,
    closes: AtomicUsize,
}

/// Scrape source answering from a queue of scripted responses. An empty queue
/// answers with a layout error, like an unexpected login page would.
#[derive(Clone, Default)]
pub struct StubScrapeSource {
    inner: Arc<SourceInner>,
}

impl StubScrapeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<KillRow>) -> &Self {
        self.inner.script.lock().push_back(Scripted::Rows(rows));
        self
    }

    pub fn push_failure(&self, reason: &str) -> &Self {
        self.inner
            .script
            .lock()
            .push_back(Scripted::Failure(reason.to_string()));
        self
    }

    /// Holds the next fetch until the returned handle is notified.
    pub fn pause_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.gate.lock() = Some(gate.clone());
        gate
    }

    /// Resolves once a paused fetch has started.
    pub async fn wait_for_paused_fetch(&self) {
        self.inner.entered.notified().await;
    }

    pub fn fetches(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn reauths(&self) -> usize {
        self.inner.reauths.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScrapeSource for StubScrapeSource {
    async fn fetch_kill_rows(&self) -> Result<Vec<KillRow>, SourceError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.inner.gate.lock().take();
        if let Some(gate) = gate {
            self.inner.entered.notify_one();
            gate.notified().await;
        }

        let next = self.inner.script.lock().pop_front();
        match next {
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Failure(reason)) => Err(SourceError::Layout(reason)),
            None => Err(SourceError::Layout("no scripted response".into())),
        }
    }

    async fn reauthenticate(&self) -> Result<(), SourceError> {
        self.inner.reauths.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Window lookup backed by a fixed table. Keys missing from the table fail
/// like an unreachable mob database.
#[derive(Clone, Default)]
pub struct StubWindowLookup {
    answers: Arc<Mutex<HashMap<(String, String), Option<RespawnWindow>>>>,
    calls: Arc<AtomicUsize>,
}

impl StubWindowLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(self, monster_id: &str, map_name: &str, min: u32, max: u32) -> Self {
        let window = RespawnWindow::new(min, max)
            .unwrap_or_else(|| panic!("fixture window {min}~{max} is reversed"));
        self.answers
            .lock()
            .insert((monster_id.to_string(), map_name.to_string()), Some(window));
        self
    }

    /// The mob database knows the monster but lists no window for the map.
    pub fn with_unknown(self, monster_id: &str, map_name: &str) -> Self {
        self.answers
            .lock()
            .insert((monster_id.to_string(), map_name.to_string()), None);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowLookup for StubWindowLookup {
    async fn lookup_window(
        &self,
        monster_id: &str,
        map_name: &str,
    ) -> Result<Option<RespawnWindow>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .lock()
            .get(&(monster_id.to_string(), map_name.to_string()))
            .copied();
        answer.ok_or_else(|| {
            SourceError::Malformed(format!("no fixture for {monster_id} on {map_name}"))
        })
    }
}

/// Sink that records what it delivers. Renders only labels per bucket so
/// the output does not depend on the clock.
#[derive(Clone, Default)]
pub struct RecordingSink {
    deliveries: Arc<Mutex<Vec<String>>>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<String> {
        self.deliveries.lock().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Polls until at least `count` deliveries were recorded.
    pub async fn wait_for_deliveries(&self, count: usize, limit: Duration) -> bool {
        let poll = async {
            while self.deliveries.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(limit, poll).await.is_ok()
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&self, board: &TimerBoard) -> String {
        [TimerStatus::Spawned, TimerStatus::Spawning, TimerStatus::Pending]
            .into_iter()
            .map(|status| {
                let labels: Vec<&str> = board
                    .bucket(status)
                    .iter()
                    .map(|e| e.label.as_str())
                    .collect();
                format!("{status:?}: {}", labels.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn deliver(&mut self, text: &str) -> Result<(), SinkError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Setup("scripted delivery failure".into()));
        }
        self.deliveries.lock().push(text.to_string());
        Ok(())
    }
}
