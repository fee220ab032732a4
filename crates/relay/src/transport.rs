use {anyhow::Result, async_trait::async_trait};

use crate::message::{FilesRemoteAddParams, RelayFile, RelayMessage, WebhookHandle};

/// Everything the bridge can do on the relay platform.
///
/// `send` and `edit` go through the channel's webhook; `update`, `remove`,
/// `files_remote_add`, and `history` use the bot-token REST API. All calls
/// run over a bounded-timeout client; failures surface as errors the caller
/// logs before abandoning the event.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Post a message through the channel webhook. With `wait`, the relay
    /// acknowledges with the stored message (including its id).
    async fn send(
        &self,
        channel: &str,
        message: RelayMessage,
        wait: bool,
        files: Vec<RelayFile>,
    ) -> Result<RelayMessage>;

    /// Rewrite a previously webhook-sent message in place.
    async fn edit(
        &self,
        channel: &str,
        message_id: &str,
        message: RelayMessage,
        files: Vec<RelayFile>,
    ) -> Result<RelayMessage>;

    /// Replace a bot-owned message; `message.id` addresses it. Returns the
    /// (possibly new) message id.
    async fn update(&self, message: RelayMessage) -> Result<String>;

    /// Delete a message from a channel.
    async fn remove(&self, channel: &str, message_id: &str) -> Result<()>;

    /// Register an externally-hosted file; returns the file reference id.
    async fn files_remote_add(&self, params: FilesRemoteAddParams) -> Result<String>;

    /// Most recent messages in a channel, newest first.
    async fn history(&self, channel: &str, limit: u32) -> Result<Vec<RelayMessage>>;
}

/// Webhook listing and creation, split out so the registry can be tested
/// against counting fakes.
#[async_trait]
pub trait WebhookProvisioner: Send + Sync {
    async fn list_webhooks(&self, channel_id: &str) -> Result<Vec<WebhookHandle>>;

    async fn create_webhook(&self, channel_id: &str, name: &str) -> Result<WebhookHandle>;
}
