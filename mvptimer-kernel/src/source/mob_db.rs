//! ratemyserver mob database: respawn windows per map.

use super::{check_status, selector, SourceError, WindowLookup};
use crate::models::RespawnWindow;
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::time::Duration;

pub const DEFAULT_MOB_DB_URL: &str =
    "http://ratemyserver.net/mob_db.php?mob_id={mob_id}&small=1&back=1";

pub struct MobDbLookup {
    client: reqwest::Client,
    url_template: String,
}

impl MobDbLookup {
    pub fn new(url_template: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("mvptimer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    fn url_for(&self, monster_id: &str) -> String {
        self.url_template.replace("{mob_id}", monster_id)
    }
}

#[async_trait]
impl WindowLookup for MobDbLookup {
    async fn lookup_window(
        &self,
        monster_id: &str,
        map_name: &str,
    ) -> Result<Option<RespawnWindow>, SourceError> {
        let response = self.client.get(self.url_for(monster_id)).send().await?;
        check_status(&response)?;
        let html = response.text().await?;
        parse_respawn_window(&html, map_name)
    }
}

/// Finds the spawn entry linking to `map_name` and reads its `min~max` minutes.
///
/// The entry text ends like `"1 / 60~70 min"`; a single number means a fixed
/// delay. No link for the map means the monster has no window there.
pub fn parse_respawn_window(
    html: &str,
    map_name: &str,
) -> Result<Option<RespawnWindow>, SourceError> {
    let document = Html::parse_document(html);
    let link_sel = selector("a[href]")?;

    let Some(link) = document
        .select(&link_sel)
        .find(|a| a.value().attr("href").is_some_and(|href| href.contains(map_name)))
    else {
        return Ok(None);
    };

    let parent = link
        .parent()
        .and_then(ElementRef::wrap)
        .ok_or_else(|| SourceError::Malformed(format!("spawn link for {map_name} has no parent")))?;
    let last = parent
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .last()
        .ok_or_else(|| SourceError::Malformed(format!("empty spawn entry for {map_name}")))?;

    let text = last.text().collect::<String>();
    let delay = text
        .rsplit(" / ")
        .next()
        .and_then(|tail| tail.split_whitespace().next())
        .ok_or_else(|| SourceError::Malformed(format!("no delay in {text:?}")))?;

    let minutes = delay
        .split('~')
        .map(|part| part.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SourceError::Malformed(format!("bad delay {delay:?}: {e}")))?;

    match minutes.as_slice() {
        [fixed] => Ok(Some(RespawnWindow::fixed(*fixed))),
        [a, b] => Ok(RespawnWindow::new(*a.min(b), *a.max(b))),
        _ => Err(SourceError::Malformed(format!("bad delay {delay:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(entries: &[String]) -> String {
        format!(
            r#"<html><body><table><tr><th>Spawn</th>
            <td>{}</td></tr></table></body></html>"#,
            entries.concat()
        )
    }

    fn spawn(map: &str, delay: &str) -> String {
        format!(r#"<div><a href="map_db.php?map={map}">{map}</a> <span>x1 / {delay}</span></div>"#)
    }

    #[test]
    fn test_window_range() {
        let html = page(&[spawn("prt_maze03", "120~130 min"), spawn("gl_chyard", "60~70 min")]);
        assert_eq!(
            parse_respawn_window(&html, "gl_chyard").unwrap(),
            RespawnWindow::new(60, 70)
        );
        assert_eq!(
            parse_respawn_window(&html, "prt_maze03").unwrap(),
            RespawnWindow::new(120, 130)
        );
    }

    #[test]
    fn test_fixed_delay_and_reversed_range() {
        let html = page(&[spawn("moc_pryd04", "60 min"), spawn("anthell02", "130~120 min")]);
        assert_eq!(
            parse_respawn_window(&html, "moc_pryd04").unwrap(),
            Some(RespawnWindow::fixed(60))
        );
        assert_eq!(
            parse_respawn_window(&html, "anthell02").unwrap(),
            RespawnWindow::new(120, 130)
        );
    }

    #[test]
    fn test_missing_map_is_unknown() {
        let html = page(&[spawn("prt_maze03", "120~130 min")]);
        assert_eq!(parse_respawn_window(&html, "pay_fild11").unwrap(), None);
    }

    #[test]
    fn test_unparsable_delay_is_malformed() {
        let html = page(&[spawn("prt_maze03", "soon")]);
        assert!(matches!(
            parse_respawn_window(&html, "prt_maze03"),
            Err(SourceError::Malformed(_))
        ));
    }
}
