use {
    dashmap::DashMap,
    std::sync::Arc,
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use {
    crate::{message::WebhookHandle, transport::WebhookProvisioner},
    crosstalk_common::PROGRAM_NAME,
};

/// Per-channel webhook handle cache with lazy, race-free provisioning.
///
/// The common-case read is a lock-free cache hit. On a miss, a per-channel
/// mutex serializes the list-or-create sequence so concurrent first
/// requests provision at most one webhook. Provisioning failures are not
/// cached; the next request retries.
pub struct WebhookRegistry {
    provisioner: Arc<dyn WebhookProvisioner>,
    cache: DashMap<String, WebhookHandle>,
    creation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WebhookRegistry {
    #[must_use]
    pub fn new(provisioner: Arc<dyn WebhookProvisioner>) -> Self {
        Self {
            provisioner,
            cache: DashMap::new(),
            creation_locks: DashMap::new(),
        }
    }

    /// Handle for a channel, provisioning on first use. `None` means the
    /// relay refused to list or create; callers log and skip the send.
    pub async fn get(&self, channel_id: &str) -> Option<WebhookHandle> {
        if let Some(handle) = self.cache.get(channel_id) {
            return Some(handle.value().clone());
        }

        let lock = self
            .creation_locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock().await;

        // Another task may have provisioned while this one waited.
        if let Some(handle) = self.cache.get(channel_id) {
            return Some(handle.value().clone());
        }

        let handle = self.provision(channel_id).await?;
        self.cache.insert(channel_id.to_string(), handle.clone());
        Some(handle)
    }

    async fn provision(&self, channel_id: &str) -> Option<WebhookHandle> {
        let existing = match self.provisioner.list_webhooks(channel_id).await {
            Ok(hooks) => hooks,
            Err(error) => {
                warn!(channel_id, error = %error, "listing relay webhooks failed");
                return None;
            },
        };
        if let Some(handle) = existing.into_iter().next() {
            debug!(channel_id, webhook_id = %handle.id, "reusing existing relay webhook");
            return Some(handle);
        }

        match self.provisioner.create_webhook(channel_id, PROGRAM_NAME).await {
            Ok(handle) => {
                debug!(channel_id, webhook_id = %handle.id, "created relay webhook");
                Some(handle)
            },
            Err(error) => {
                warn!(channel_id, error = %error, "creating relay webhook failed");
                None
            },
        }
    }

    /// Drop every cached handle (e.g. after credential rotation). The next
    /// `get` per channel re-lists and re-creates as needed.
    pub fn reset(&self) {
        self.cache.clear();
        self.creation_locks.clear();
        debug!("webhook registry reset");
    }
}
