//! Process configuration, read once at startup.
//!
//! Values come from `.env` in the working directory, overridden by process
//! environment variables carrying the `MVPTIMER_` prefix.

use crate::ledger::LEDGER_FILE;
use crate::render::{Flavor, RenderOptions};
use crate::source::mob_db::DEFAULT_MOB_DB_URL;
use crate::source::Credentials;
use crate::windows::WINDOWS_FILE;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_PREFIX: &str = "MVPTIMER_";
pub const DEFAULT_MAX_MINUTES: f64 = 60000.0;
pub const DEFAULT_UPDATE_PERIOD_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct DiscordConf {
    pub token: String,
    pub guild_name: String,
    pub channel_name: String,
}

impl std::fmt::Debug for DiscordConf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConf")
            .field("token", &"***")
            .field("guild_name", &self.guild_name)
            .field("channel_name", &self.channel_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MvpTimerConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub server_tz: Tz,
    pub local_tz: Tz,
    pub time_relative: bool,
    /// `None` disables the staleness cutoff.
    pub max_stale_minutes: Option<f64>,
    pub update_period: Duration,
    pub data_dir: PathBuf,
    pub mob_db_url: String,
    pub http_addr: Option<SocketAddr>,
    pub api_key: Option<String>,
    pub discord: Option<DiscordConf>,
}

impl MvpTimerConfig {
    /// Reads `.env` then the prefixed process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();

        match dotenvy::dotenv_iter() {
            Ok(iter) => {
                for item in iter {
                    match item {
                        Ok((key, value)) => {
                            vars.insert(key, value);
                        }
                        Err(e) => warn!(error = %e, "ignoring invalid .env line"),
                    }
                }
            }
            Err(e) if e.not_found() => debug!("no .env file, using environment only"),
            Err(e) => warn!(error = %e, "failed to read .env"),
        }

        for (key, value) in std::env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                vars.insert(stripped.to_string(), value);
            }
        }

        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let required = |key: &'static str| {
            get(key)
                .map(str::to_string)
                .ok_or(ConfigError::Missing(key))
        };

        let base_url = required("BASE_URL")?;
        let credentials = Credentials {
            server: required("SERVER")?,
            username: required("USERNAME")?,
            password: required("PASSWORD")?,
        };
        let server_tz = parse_tz("SERVER_TZ", &required("SERVER_TZ")?)?;
        let local_tz = parse_tz("LOCAL_TZ", &required("LOCAL_TZ")?)?;

        let time_relative = match get("TIME_RELATIVE") {
            None => false,
            Some(v) => parse_flag("TIME_RELATIVE", v)?,
        };

        let max_stale_minutes = match get("MAX_MINUTES") {
            None => Some(DEFAULT_MAX_MINUTES),
            Some(v) if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(f64::from(parse_number::<u32>("MAX_MINUTES", v)?)),
        };

        let update_period = match get("UPDATE_PERIOD") {
            None => Duration::from_secs(DEFAULT_UPDATE_PERIOD_SECS),
            Some(v) => match parse_number::<u64>("UPDATE_PERIOD", v)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "UPDATE_PERIOD",
                        reason: "must be at least one second".into(),
                    })
                }
                secs => Duration::from_secs(secs),
            },
        };

        let http_addr = get("HTTP_ADDR")
            .map(|v| {
                v.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                    key: "HTTP_ADDR",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let discord = match get("TOKEN") {
            None => None,
            Some(token) => Some(DiscordConf {
                token: token.to_string(),
                guild_name: required("GUILD_NAME")?,
                channel_name: required("CHANNEL_NAME")?,
            }),
        };

        Ok(Self {
            base_url,
            credentials,
            server_tz,
            local_tz,
            time_relative,
            max_stale_minutes,
            update_period,
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data")),
            mob_db_url: get("MOB_DB_URL").unwrap_or(DEFAULT_MOB_DB_URL).to_string(),
            http_addr,
            api_key: get("API_KEY").map(str::to_string),
            discord,
        })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn windows_path(&self) -> PathBuf {
        self.data_dir.join(WINDOWS_FILE)
    }

    pub fn render_options(&self, flavor: Flavor) -> RenderOptions {
        RenderOptions {
            relative: self.time_relative,
            server_tz: self.server_tz,
            local_tz: self.local_tz,
            flavor,
        }
    }
}

fn parse_tz(key: &'static str, value: &str) -> Result<Tz, ConfigError> {
    value.parse::<Tz>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        other => parse_number::<i64>(key, other).map(|n| n != 0),
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value:?}: {e}"),
    })
}
