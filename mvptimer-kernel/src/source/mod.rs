//! External collaborators feeding the core: the kill ranking scrape and the
//! respawn window lookup.
//!
//! All markup assumptions live in the submodules; the core only sees
//! [`KillRow`] and [`RespawnWindow`].

pub mod fluxcp;
pub mod mob_db;

use crate::models::{KillRow, RespawnWindow};
use async_trait::async_trait;
use scraper::Selector;

pub use fluxcp::{Credentials, FluxCpSource};
pub use mob_db::MobDbLookup;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Page layout not recognised: {0}")]
    Layout(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Where kill observations come from. Implementations may hold a session that
/// needs re-authentication.
#[async_trait]
pub trait ScrapeSource: Send + Sync {
    /// Rows in page order, newest first as the ranking lists them.
    async fn fetch_kill_rows(&self) -> Result<Vec<KillRow>, SourceError>;

    async fn reauthenticate(&self) -> Result<(), SourceError>;

    /// Releases the session (logout). Default is a no-op.
    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[async_trait]
pub trait WindowLookup: Send + Sync {
    /// `Ok(None)` when the monster has no window defined for that map.
    async fn lookup_window(
        &self,
        monster_id: &str,
        map_name: &str,
    ) -> Result<Option<RespawnWindow>, SourceError>;
}

pub(crate) fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Layout(format!("invalid selector {css}: {e:?}")))
}

pub(crate) fn check_status(response: &reqwest::Response) -> Result<(), SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}
