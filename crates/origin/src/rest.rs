use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    std::time::Duration,
    tracing::debug,
};

use crate::types::{Channel, Member, Message};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Origin-platform REST surface used by the bridge.
#[async_trait]
pub trait OriginApi: Send + Sync {
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Message>;

    async fn get_guild_member(&self, guild_id: &str, user_id: &str) -> Result<Member>;

    async fn get_channel(&self, channel_id: &str) -> Result<Channel>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>>;

    /// Deep link to a message in the origin's web client.
    fn message_link(&self, guild_id: &str, channel_id: &str, message_id: &str) -> String;

    /// Deep link to a channel in the origin's web client.
    fn channel_link(&self, guild_id: &str, channel_id: &str) -> String;
}

/// REST client over the origin platform's HTTP API.
pub struct HttpOriginClient {
    http: reqwest::Client,
    api_base: String,
    web_base: String,
    token: Secret<String>,
}

impl HttpOriginClient {
    pub fn new(api_base: impl Into<String>, token: Secret<String>) -> Result<Self> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        // The web client lives one path level above the API root.
        let web_base = api_base
            .strip_suffix("/api")
            .unwrap_or(&api_base)
            .to_string();
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building origin http client")?;
        Ok(Self {
            http,
            api_base,
            web_base,
            token,
        })
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.api_base);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .with_context(|| format!("origin GET {path}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("origin GET {path} failed ({status}): {body}");
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decoding origin GET {path}"))
    }
}

#[async_trait]
impl OriginApi for HttpOriginClient {
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Message> {
        self.get_json(&format!("/channels/{channel_id}/messages/{message_id}"))
            .await
    }

    async fn get_guild_member(&self, guild_id: &str, user_id: &str) -> Result<Member> {
        self.get_json(&format!("/guilds/{guild_id}/members/{user_id}"))
            .await
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        self.get_json(&format!("/channels/{channel_id}")).await
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        let resp = self
            .http
            .delete(format!("{}{path}", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .with_context(|| format!("origin DELETE {path}"))?;
        // Deletion acknowledges with 204 and an empty body.
        if resp.status() != reqwest::StatusCode::NO_CONTENT {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("origin DELETE {path} failed ({status}): {body}");
        }
        debug!(channel_id, message_id, "origin message deleted");
        Ok(())
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("downloading attachment {url}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("attachment download failed ({}): {url}", resp.status());
        }
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("reading attachment body {url}"))?;
        Ok(bytes.to_vec())
    }

    fn message_link(&self, guild_id: &str, channel_id: &str, message_id: &str) -> String {
        format!(
            "{}/channels/{guild_id}/{channel_id}/{message_id}",
            self.web_base
        )
    }

    fn channel_link(&self, guild_id: &str, channel_id: &str) -> String {
        format!("{}/channels/{guild_id}/{channel_id}", self.web_base)
    }
}
