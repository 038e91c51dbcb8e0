/*!
 * Console sink.
 *
 * ROLE: fallback presentation when no Discord channel is configured.
 */

use super::{PresentationSink, SinkError};
use crate::models::TimerBoard;
use crate::render::{render, RenderOptions};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};

/// Prints each changed board to standard output.
pub struct ConsoleSink {
    options: RenderOptions,
    out: Stdout,
}

impl ConsoleSink {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            out: tokio::io::stdout(),
        }
    }
}

#[async_trait]
impl PresentationSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn render(&self, board: &TimerBoard) -> String {
        render(board, &self.options)
    }

    async fn deliver(&mut self, text: &str) -> Result<(), SinkError> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}
