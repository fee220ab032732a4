use {
    dashmap::DashMap,
    std::sync::Arc,
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use {
    crosstalk_common::{Error, Result},
    crosstalk_origin::{OriginApi, VoiceStateEvent},
    crosstalk_relay::{RelayMessage, RelayTransport},
    crosstalk_routing::{ChannelRoute, RouteStore},
};

use crate::{
    render,
    state::{GuildVoiceState, OccupantState, VoiceTransition},
};

/// Identity shown on status messages.
const STATUS_USERNAME: &str = "Voice Watcher";
const STATUS_ICON: &str = "headphones";

/// Drives voice occupancy per guild and keeps at most one live status
/// message per routed relay channel.
///
/// Each event runs entirely under its guild's lock — read, transition,
/// and the outbound relay call — so rapid join/leave flapping cannot race
/// two transitions into creating duplicate status messages. The status-id
/// map changes only inside that critical section, and only after the relay
/// acknowledged the call.
pub struct PresenceTracker {
    origin: Arc<dyn OriginApi>,
    relay: Arc<dyn RelayTransport>,
    routes: Arc<dyn RouteStore>,
    guilds: DashMap<String, Arc<Mutex<GuildVoiceState>>>,
    status_ids: DashMap<String, String>,
    bot_user_id: String,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(
        origin: Arc<dyn OriginApi>,
        relay: Arc<dyn RelayTransport>,
        routes: Arc<dyn RouteStore>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            relay,
            routes,
            guilds: DashMap::new(),
            status_ids: DashMap::new(),
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Handle one voice-state event end to end.
    pub async fn handle_voice_state(&self, event: &VoiceStateEvent) -> Result<()> {
        if event.user_id == self.bot_user_id {
            return Ok(());
        }

        let guild = self
            .guilds
            .entry(event.guild_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(GuildVoiceState::default())))
            .clone();
        let mut state = guild.lock().await;

        // An unresolvable target channel reads the same as having left.
        let target = if event.left_voice() {
            None
        } else {
            match self.origin.get_channel(&event.channel_id).await {
                Ok(channel) => Some(channel),
                Err(error) => {
                    debug!(
                        channel_id = %event.channel_id,
                        error = %error,
                        "voice channel unresolvable, treating as leave"
                    );
                    None
                },
            }
        };

        let occupant = match &target {
            Some(_) => {
                let member = self
                    .origin
                    .get_guild_member(&event.guild_id, &event.user_id)
                    .await
                    .map_err(|e| Error::transport("fetching voice member", e))?;
                OccupantState::from_event(event, member.display_name())
            },
            None => OccupantState::from_event(event, ""),
        };

        let transition = state.apply_event(target.as_ref(), occupant);
        let Some(channel_id) = transition.channel_id().map(str::to_string) else {
            return Ok(());
        };

        let Some(route) = self.routes.find_route(&channel_id, &event.guild_id).await else {
            return Ok(());
        };
        if !route.flags.send_voice_state {
            return Ok(());
        }
        if matches!(transition, VoiceTransition::StateChanged { .. })
            && !route.flags.send_mute_state
        {
            return Ok(());
        }

        self.publish(&route, &state, &channel_id, &transition).await
    }

    async fn publish(
        &self,
        route: &ChannelRoute,
        state: &GuildVoiceState,
        channel_id: &str,
        transition: &VoiceTransition,
    ) -> Result<()> {
        let blocks = if route.is_aggregate() {
            render::guild_blocks(state)
        } else {
            match state.channel(channel_id) {
                Some(channel) => render::single_channel_blocks(channel),
                None => {
                    warn!(channel_id, "transitioned channel is not tracked");
                    return Ok(());
                },
            }
        };

        let message = RelayMessage {
            username: Some(STATUS_USERNAME.into()),
            icon_emoji: Some(STATUS_ICON.into()),
            blocks,
            ..RelayMessage::in_channel(route.relay_channel.as_str())
        };
        let relay_channel = route.relay_channel.as_str();

        match transition {
            VoiceTransition::Entered { .. } => {
                // A fresh status message keeps it the latest item in the
                // channel; the previous one goes first.
                if let Some((_, previous)) = self.status_ids.remove(relay_channel) {
                    if let Err(error) = self.relay.remove(relay_channel, &previous).await {
                        warn!(relay_channel, error = %error, "removing old status message failed");
                    }
                }
                self.send_and_record(relay_channel, message).await?;
            },
            VoiceTransition::Left { .. } | VoiceTransition::StateChanged { .. } => {
                let tracked = self
                    .status_ids
                    .get(relay_channel)
                    .map(|entry| entry.value().clone());
                match tracked {
                    Some(previous) => {
                        let mut message = message;
                        message.id = Some(previous);
                        let new_id = self
                            .relay
                            .update(message)
                            .await
                            .map_err(|e| Error::transport("updating status message", e))?;
                        self.status_ids.insert(relay_channel.to_string(), new_id);
                    },
                    // Nothing tracked: send fresh and record; no follow-up
                    // update against an id we never had.
                    None => self.send_and_record(relay_channel, message).await?,
                }
            },
            VoiceTransition::Emptied { .. } => {
                if let Some((_, previous)) = self.status_ids.remove(relay_channel) {
                    if let Err(error) = self.relay.remove(relay_channel, &previous).await {
                        warn!(relay_channel, error = %error, "removing status message failed");
                    }
                }
            },
            VoiceTransition::NoOp => {},
        }

        Ok(())
    }

    async fn send_and_record(&self, relay_channel: &str, message: RelayMessage) -> Result<()> {
        let sent = self
            .relay
            .send(relay_channel, message, true, Vec::new())
            .await
            .map_err(|e| Error::transport("sending status message", e))?;
        match sent.id {
            Some(id) => {
                self.status_ids.insert(relay_channel.to_string(), id);
            },
            None => warn!(relay_channel, "relay did not return a status message id"),
        }
        Ok(())
    }
}
