//! Discord channel sink over the REST API.
//!
//! The bot keeps a single message of its own in the target channel and edits
//! it in place. Older messages the bot left behind are deleted at setup.

use super::{PresentationSink, SinkError};
use crate::config::DiscordConf;
use crate::models::TimerBoard;
use crate::render::{render, RenderOptions};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

pub const DISCORD_API: &str = "https://discord.com/api/v10";
/// Message shown before the first board is rendered.
pub const PLACEHOLDER: &str = "_ _";
const HISTORY_LIMIT: u32 = 100;
const GUILD_TEXT: u8 = 0;

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Message {
    id: String,
    author: User,
}

pub struct DiscordSink {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: String,
    message_id: String,
    options: RenderOptions,
}

impl DiscordSink {
    /// Finds the configured channel and claims the message to edit.
    /// An unknown guild or channel is fatal.
    pub async fn connect(conf: &DiscordConf, options: RenderOptions) -> Result<Self, SinkError> {
        Self::connect_to(DISCORD_API, conf, options).await
    }

    pub async fn connect_to(
        api_base: &str,
        conf: &DiscordConf,
        options: RenderOptions,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("DiscordBot (mvptimer, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;
        let mut sink = Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: conf.token.clone(),
            channel_id: String::new(),
            message_id: String::new(),
            options,
        };

        let me: User = sink.call(sink.get("/users/@me")).await?;
        info!(bot = %me.username, "discord: logged in");

        let guilds: Vec<Guild> = sink.call(sink.get("/users/@me/guilds")).await?;
        let guild = guilds
            .into_iter()
            .find(|g| g.name == conf.guild_name)
            .ok_or_else(|| SinkError::Setup(format!("server {} not found", conf.guild_name)))?;

        let channels: Vec<Channel> = sink
            .call(sink.get(&format!("/guilds/{}/channels", guild.id)))
            .await?;
        let channel = channels
            .into_iter()
            .find(|c| c.kind == GUILD_TEXT && c.name.as_deref() == Some(conf.channel_name.as_str()))
            .ok_or_else(|| {
                SinkError::Setup(format!(
                    "channel {} not found on server {}",
                    conf.channel_name, guild.name
                ))
            })?;
        sink.channel_id = channel.id;

        let history: Vec<Message> = sink
            .call(sink.get(&format!(
                "/channels/{}/messages?limit={HISTORY_LIMIT}",
                sink.channel_id
            )))
            .await?;
        let (keep, stale) = split_own_messages(history, &me.id);

        for message in stale {
            let request = sink.client.delete(sink.url(&format!(
                "/channels/{}/messages/{}",
                sink.channel_id, message.id
            )));
            if let Err(e) = sink.call_empty(request).await {
                warn!(
                    message_id = %message.id,
                    error = %e,
                    "discord: failed to delete old message"
                );
            }
        }

        sink.message_id = match keep {
            Some(message) => message.id,
            None => {
                let request = sink
                    .client
                    .post(sink.url(&format!("/channels/{}/messages", sink.channel_id)))
                    .json(&serde_json::json!({ "content": PLACEHOLDER }));
                let message: Message = sink.call(request).await?;
                message.id
            }
        };

        info!(
            guild = %guild.name,
            channel = %conf.channel_name,
            message_id = %sink.message_id,
            "discord: timer message ready"
        );
        Ok(sink)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SinkError> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SinkError> {
        Ok(self.send(request).await?.json::<T>().await?)
    }

    async fn call_empty(&self, request: RequestBuilder) -> Result<(), SinkError> {
        self.send(request).await?;
        Ok(())
    }
}

/// Splits channel history into the newest own message, kept for editing, and
/// the remaining own messages. History is listed newest first.
pub(crate) fn split_own_messages(
    history: Vec<Message>,
    own_id: &str,
) -> (Option<Message>, Vec<Message>) {
    let mut own = history.into_iter().filter(|m| m.author.id == own_id);
    let keep = own.next();
    (keep, own.collect())
}

#[async_trait]
impl PresentationSink for DiscordSink {
    fn name(&self) -> &str {
        "discord"
    }

    fn render(&self, board: &TimerBoard) -> String {
        render(board, &self.options)
    }

    async fn deliver(&mut self, text: &str) -> Result<(), SinkError> {
        let request = self
            .client
            .patch(self.url(&format!(
                "/channels/{}/messages/{}",
                self.channel_id, self.message_id
            )))
            .json(&serde_json::json!({ "content": text }));
        self.call_empty(request).await
    }
}
