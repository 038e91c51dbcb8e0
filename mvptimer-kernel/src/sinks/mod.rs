//! Presentation sinks: where rendered boards end up.
//!
//! Each sink runs in its own task, watching the board channel. Only the latest
//! board matters, so a slow sink skips intermediate boards instead of queueing
//! them. Text identical to the last successful delivery is not re-sent.

pub mod console;
pub mod discord;

use crate::models::TimerBoard;
use crate::state::BoardReceiver;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use console::ConsoleSink;
pub use discord::DiscordSink;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("setup failed: {0}")]
    Setup(String),
}

#[async_trait]
pub trait PresentationSink: Send {
    fn name(&self) -> &str;

    fn render(&self, board: &TimerBoard) -> String;

    async fn deliver(&mut self, text: &str) -> Result<(), SinkError>;
}

/// Delivers `board` unless it renders to `last`. On success `last` is updated;
/// on failure it is left alone so the next board retries.
pub async fn publish_if_changed(
    sink: &mut dyn PresentationSink,
    board: &TimerBoard,
    last: &mut Option<String>,
) -> bool {
    let text = sink.render(board);
    if last.as_deref() == Some(text.as_str()) {
        debug!(sink = sink.name(), "board unchanged, skipping");
        return false;
    }

    match sink.deliver(&text).await {
        Ok(()) => {
            *last = Some(text);
            true
        }
        Err(e) => {
            warn!(sink = sink.name(), error = %e, "delivery failed, will retry with next board");
            false
        }
    }
}

/// Returns once every board sender is gone.
pub async fn run_presentation(mut sink: Box<dyn PresentationSink>, mut boards: BoardReceiver) {
    info!(sink = sink.name(), "presentation started");
    let mut last = None;

    // A board may already be waiting from before the sink was ready.
    boards.mark_changed();
    while boards.changed().await.is_ok() {
        let board = boards.borrow_and_update().clone();
        if let Some(board) = board {
            publish_if_changed(sink.as_mut(), &board, &mut last).await;
        }
    }
    info!(sink = sink.name(), "presentation stopped");
}

pub fn spawn_presentation_task(
    sink: Box<dyn PresentationSink>,
    boards: BoardReceiver,
) -> JoinHandle<()> {
    tokio::spawn(run_presentation(sink, boards))
}
