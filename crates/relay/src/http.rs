use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    reqwest::multipart::{Form, Part},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    std::{sync::Arc, time::Duration},
    tracing::debug,
};

use crate::{
    message::{FilesRemoteAddParams, RelayFile, RelayMessage, WebhookHandle},
    registry::WebhookRegistry,
    transport::{RelayTransport, WebhookProvisioner},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Webhook/REST client for the relay platform.
///
/// Sends and edits resolve the destination channel's webhook through the
/// embedded [`WebhookRegistry`] and post multipart bodies (`payload_json`
/// plus `files[n]` parts). The remaining operations authenticate with the
/// bot token.
pub struct HttpRelayClient {
    http: reqwest::Client,
    api_base: String,
    token: Secret<String>,
    webhooks: Arc<WebhookRegistry>,
}

/// Bot-token webhook provisioning API, split from the client so the
/// registry owns exactly the list-or-create surface.
struct WebhookApi {
    http: reqwest::Client,
    api_base: String,
    token: Secret<String>,
}

impl HttpRelayClient {
    pub fn new(api_base: impl Into<String>, token: Secret<String>) -> Result<Self> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building relay http client")?;
        let provisioner = WebhookApi {
            http: http.clone(),
            api_base: api_base.clone(),
            token: token.clone(),
        };
        let webhooks = Arc::new(WebhookRegistry::new(Arc::new(provisioner)));
        Ok(Self {
            http,
            api_base,
            token,
            webhooks,
        })
    }

    /// Registry handle, shared with the control path for cache resets.
    #[must_use]
    pub fn webhooks(&self) -> Arc<WebhookRegistry> {
        Arc::clone(&self.webhooks)
    }

    fn bearer(&self) -> &str {
        self.token.expose_secret()
    }

    async fn webhook_call(
        &self,
        method: reqwest::Method,
        url: String,
        message: &RelayMessage,
        files: Vec<RelayFile>,
        context: &str,
    ) -> Result<RelayMessage> {
        let form = multipart_form(message, files)?;
        let resp = self
            .http
            .request(method, url)
            .multipart(form)
            .send()
            .await
            .with_context(|| context.to_string())?;
        let resp = ensure_success(resp, context).await?;
        resp.json::<RelayMessage>()
            .await
            .with_context(|| format!("decoding {context} response"))
    }
}

fn multipart_form(message: &RelayMessage, files: Vec<RelayFile>) -> Result<Form> {
    let payload = serde_json::to_string(message).context("encoding relay payload")?;
    let mut form = Form::new().part(
        "payload_json",
        Part::text(payload)
            .mime_str("application/json")
            .context("payload part")?,
    );
    for (i, file) in files.into_iter().enumerate() {
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)
            .with_context(|| format!("file part {i}"))?;
        form = form.part(format!("files[{i}]"), part);
    }
    Ok(form)
}

async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{context} failed ({status}): {body}")
}

#[derive(Deserialize)]
struct FileRefResponse {
    id: String,
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn send(
        &self,
        channel: &str,
        message: RelayMessage,
        wait: bool,
        files: Vec<RelayFile>,
    ) -> Result<RelayMessage> {
        let hook = self
            .webhooks
            .get(channel)
            .await
            .ok_or_else(|| anyhow::anyhow!("no webhook available for relay channel {channel}"))?;
        let mut url = format!("{}/webhooks/{}/{}", self.api_base, hook.id, hook.token);
        if wait {
            url.push_str("?wait=true");
        }
        debug!(channel, wait, "relay webhook send");
        self.webhook_call(reqwest::Method::POST, url, &message, files, "relay webhook send")
            .await
    }

    async fn edit(
        &self,
        channel: &str,
        message_id: &str,
        message: RelayMessage,
        files: Vec<RelayFile>,
    ) -> Result<RelayMessage> {
        let hook = self
            .webhooks
            .get(channel)
            .await
            .ok_or_else(|| anyhow::anyhow!("no webhook available for relay channel {channel}"))?;
        let url = format!(
            "{}/webhooks/{}/{}/messages/{message_id}",
            self.api_base, hook.id, hook.token
        );
        debug!(channel, message_id, "relay webhook edit");
        self.webhook_call(reqwest::Method::PATCH, url, &message, files, "relay webhook edit")
            .await
    }

    async fn update(&self, message: RelayMessage) -> Result<String> {
        let id = message
            .id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("relay update requires a message id"))?;
        let url = format!(
            "{}/channels/{}/messages/{id}",
            self.api_base, message.channel
        );
        let resp = self
            .http
            .patch(url)
            .bearer_auth(self.bearer())
            .json(&message)
            .send()
            .await
            .context("relay update")?;
        let resp = ensure_success(resp, "relay update").await?;
        let updated: RelayMessage = resp.json().await.context("decoding relay update response")?;
        Ok(updated.id.unwrap_or(id))
    }

    async fn remove(&self, channel: &str, message_id: &str) -> Result<()> {
        let url = format!("{}/channels/{channel}/messages/{message_id}", self.api_base);
        let resp = self
            .http
            .delete(url)
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("relay remove")?;
        ensure_success(resp, "relay remove").await?;
        Ok(())
    }

    async fn files_remote_add(&self, params: FilesRemoteAddParams) -> Result<String> {
        let url = format!("{}/files/remote", self.api_base);
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.bearer())
            .json(&params)
            .send()
            .await
            .context("relay files.remote add")?;
        let resp = ensure_success(resp, "relay files.remote add").await?;
        let file_ref: FileRefResponse = resp
            .json()
            .await
            .context("decoding relay files.remote response")?;
        Ok(file_ref.id)
    }

    async fn history(&self, channel: &str, limit: u32) -> Result<Vec<RelayMessage>> {
        let url = format!(
            "{}/channels/{channel}/messages?limit={limit}",
            self.api_base
        );
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("relay history")?;
        let resp = ensure_success(resp, "relay history").await?;
        resp.json::<Vec<RelayMessage>>()
            .await
            .context("decoding relay history response")
    }
}

#[async_trait]
impl WebhookProvisioner for WebhookApi {
    async fn list_webhooks(&self, channel_id: &str) -> Result<Vec<WebhookHandle>> {
        let url = format!("{}/channels/{channel_id}/webhooks", self.api_base);
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .context("listing relay webhooks")?;
        let resp = ensure_success(resp, "listing relay webhooks").await?;
        resp.json::<Vec<WebhookHandle>>()
            .await
            .context("decoding relay webhook list")
    }

    async fn create_webhook(&self, channel_id: &str, name: &str) -> Result<WebhookHandle> {
        let url = format!("{}/channels/{channel_id}/webhooks", self.api_base);
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .context("creating relay webhook")?;
        let resp = ensure_success(resp, "creating relay webhook").await?;
        resp.json::<WebhookHandle>()
            .await
            .context("decoding created relay webhook")
    }
}
