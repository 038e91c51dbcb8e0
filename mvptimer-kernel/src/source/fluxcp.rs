//! FluxCP control panel: login session and the MVP kill ranking page.

use super::{check_status, selector, ScrapeSource, SourceError};
use crate::models::KillRow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use scraper::{ElementRef, Html};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "?module=account&action=login";
pub const LOGOUT_PATH: &str = "?module=account&action=logout";
pub const MVP_RANKING_PATH: &str = "?module=ranking&action=mvp";

const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d/%m/%Y %H:%M:%S"];

#[derive(Clone)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub struct FluxCpSource {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    server_tz: Tz,
}

impl FluxCpSource {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        server_tz: Tz,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("mvptimer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            credentials,
            server_tz,
        })
    }

    pub async fn login(&self) -> Result<(), SourceError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("server", self.credentials.server.as_str()),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;
        check_status(&response)?;
        info!(username = %self.credentials.username, "website: logged in");
        Ok(())
    }
}

#[async_trait]
impl ScrapeSource for FluxCpSource {
    async fn fetch_kill_rows(&self) -> Result<Vec<KillRow>, SourceError> {
        let url = format!("{}{}", self.base_url, MVP_RANKING_PATH);
        let response = self.client.get(&url).send().await?;
        check_status(&response)?;
        let html = response.text().await?;
        let rows = parse_kill_table(&html, self.server_tz)?;
        debug!(rows = rows.len(), "kill ranking scraped");
        Ok(rows)
    }

    async fn reauthenticate(&self) -> Result<(), SourceError> {
        self.login().await
    }

    async fn close(&self) -> Result<(), SourceError> {
        let url = format!("{}{}", self.base_url, LOGOUT_PATH);
        let response = self.client.get(&url).send().await?;
        check_status(&response)?;
        info!("website: logged out");
        Ok(())
    }
}

/// Parses the `horizontal-table` kill ranking. A missing table usually means
/// the session expired and the login form was served instead.
pub fn parse_kill_table(html: &str, server_tz: Tz) -> Result<Vec<KillRow>, SourceError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.horizontal-table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let link_sel = selector("a[href]")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| SourceError::Layout("kill ranking table not found".into()))?;

    let mut rows = Vec::new();
    for (index, tr) in table.select(&row_sel).skip(1).enumerate() {
        let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
        match parse_row(&cells, &link_sel, server_tz) {
            Some(row) => rows.push(row),
            None => warn!(row = index + 1, "skipping unparsable kill row"),
        }
    }
    Ok(rows)
}

fn parse_row(cells: &[ElementRef], link_sel: &scraper::Selector, server_tz: Tz) -> Option<KillRow> {
    if cells.len() < 5 {
        return None;
    }
    let killed_at = parse_server_time(&first_text(&cells[0])?, server_tz)?;
    let player = first_text(&cells[1]);

    let link = cells[2].select(link_sel).next()?;
    let monster_name = link.text().collect::<String>().trim().to_string();
    let monster_id = link.value().attr("href")?.rsplit("id=").next()?.trim().to_string();
    let map_name = first_text(&cells[4])?;

    if monster_name.is_empty() || monster_id.is_empty() {
        return None;
    }

    Some(KillRow {
        monster_name,
        monster_id,
        map_name,
        killed_at,
        player,
    })
}

fn first_text(cell: &ElementRef) -> Option<String> {
    cell.text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Kill times are printed as naive wall-clock times of the game server.
pub fn parse_server_time(text: &str, server_tz: Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let naive = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())?;
    server_tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
