//! Relay-platform transport: message model, webhook/REST client, and the
//! per-channel webhook registry.
//!
//! The relay platform has no push surface; everything the bridge does there
//! goes through [`RelayTransport`]. Sends and edits are addressed through
//! per-channel webhooks, provisioned lazily by [`WebhookRegistry`]; message
//! updates, removals, remote-file registration, and history reads use the
//! bot-token REST API.

pub mod http;
pub mod message;
pub mod registry;
pub mod transport;

pub use http::HttpRelayClient;
pub use message::{
    Block, FilesRemoteAddParams, MessageAttachment, RelayFile, RelayMessage, WebhookHandle,
    file_type_for,
};
pub use registry::WebhookRegistry;
pub use transport::{RelayTransport, WebhookProvisioner};
