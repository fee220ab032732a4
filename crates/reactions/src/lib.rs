//! Reaction sync: any reaction event triggers a refetch of the origin
//! message's full reaction state and a full-replacement republish onto the
//! mirrored relay message. Extra calls buy convergence under reordered or
//! dropped events; nothing is patched incrementally.

use {
    std::sync::Arc,
    tracing::{debug, info},
};

use {
    crosstalk_common::{Error, Result},
    crosstalk_mirror::anchor,
    crosstalk_origin::{OriginApi, Reaction, ReactionEvent},
    crosstalk_relay::{Block, RelayTransport},
    crosstalk_routing::RouteStore,
};

/// How far back to look for the mirrored counterpart.
const HISTORY_LIMIT: u32 = 100;

/// Marker prefix distinguishing the reaction summary from other context
/// blocks on a mirrored message.
const SUMMARY_PREFIX: &str = "reactions:";

/// Republishes origin reaction state onto mirrored relay messages.
pub struct ReactionSync {
    origin: Arc<dyn OriginApi>,
    relay: Arc<dyn RelayTransport>,
    routes: Arc<dyn RouteStore>,
}

impl ReactionSync {
    #[must_use]
    pub fn new(
        origin: Arc<dyn OriginApi>,
        relay: Arc<dyn RelayTransport>,
        routes: Arc<dyn RouteStore>,
    ) -> Self {
        Self {
            origin,
            relay,
            routes,
        }
    }

    /// Handle a reaction add/remove/remove-all event; all three converge on
    /// the same refetch-and-replace.
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> Result<()> {
        let Some(route) = self
            .routes
            .find_route(&event.channel_id, &event.guild_id)
            .await
        else {
            return Ok(());
        };
        if !route.flags.forward_origin_to_relay {
            return Ok(());
        }

        let message = self
            .origin
            .get_message(&event.channel_id, &event.message_id)
            .await
            .map_err(|e| Error::transport("refetching reacted message", e))?;

        let history = self
            .relay
            .history(&route.relay_channel, HISTORY_LIMIT)
            .await
            .map_err(|e| Error::transport("reading relay history", e))?;

        let Some(mut mirrored) = history.into_iter().find(|candidate| {
            anchor::extract_timestamp(&candidate.text) == Some(message.timestamp.as_str())
        }) else {
            // The mirror may never have been delivered; best-effort only.
            debug!(
                message_id = %event.message_id,
                relay_channel = %route.relay_channel,
                "no mirrored counterpart for reacted message"
            );
            return Ok(());
        };

        mirrored.channel = route.relay_channel.clone();
        mirrored
            .blocks
            .retain(|block| !is_reaction_summary(block));
        if let Some(summary) = reaction_summary(&message.reactions) {
            mirrored.blocks.push(Block::context(summary));
        }

        self.relay
            .update(mirrored)
            .await
            .map_err(|e| Error::transport("republishing reaction state", e))?;

        info!(
            message_id = %event.message_id,
            reactions = message.reactions.len(),
            "reaction state republished"
        );
        Ok(())
    }
}

fn is_reaction_summary(block: &Block) -> bool {
    matches!(block, Block::Context { text } if text.starts_with(SUMMARY_PREFIX))
}

/// Full reaction state as one context line; `None` when no reactions remain.
fn reaction_summary(reactions: &[Reaction]) -> Option<String> {
    if reactions.is_empty() {
        return None;
    }
    let rendered: Vec<String> = reactions
        .iter()
        .map(|r| format!(":{}: {}", r.emoji, r.count))
        .collect();
    Some(format!("{SUMMARY_PREFIX} {}", rendered.join("  ")))
}
