//! Pure per-guild voice occupancy state machine.

use std::collections::BTreeMap;

use crosstalk_origin::{Channel, VoiceStateEvent};

/// One tracked voice occupant. Mute and deafen are presence-independent
/// flags refreshed on every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupantState {
    pub user_id: String,
    pub display_name: String,
    pub muted: bool,
    pub deafened: bool,
}

impl OccupantState {
    /// Flags derived from a voice-state event: server mute counts as mute.
    #[must_use]
    pub fn from_event(event: &VoiceStateEvent, display_name: impl Into<String>) -> Self {
        Self {
            user_id: event.user_id.clone(),
            display_name: display_name.into(),
            muted: event.server_mute || event.self_mute,
            deafened: event.self_deaf,
        }
    }
}

/// A voice channel and its occupants, in join order. Entries persist at
/// zero occupancy until the next join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: String,
    pub name: String,
    pub occupants: Vec<OccupantState>,
}

/// The transition one event produced. Total over (previous occupancy,
/// event kind): exactly one variant per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceTransition {
    /// A user not previously tracked in the guild joined a channel.
    Entered { channel_id: String },
    /// A user left a channel that still has occupants.
    Left { channel_id: String },
    /// The last occupant left a channel.
    Emptied { channel_id: String },
    /// A tracked user changed channel or flags.
    StateChanged { channel_id: String },
    /// The event concerned nobody we track.
    NoOp,
}

impl VoiceTransition {
    /// The channel the transition is about, when there is one.
    #[must_use]
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::Entered { channel_id }
            | Self::Left { channel_id }
            | Self::Emptied { channel_id }
            | Self::StateChanged { channel_id } => Some(channel_id),
            Self::NoOp => None,
        }
    }
}

/// Voice occupancy for one guild. Mutated only under the guild's lock.
#[derive(Debug, Default)]
pub struct GuildVoiceState {
    channels: BTreeMap<String, VoiceChannel>,
}

impl GuildVoiceState {
    #[must_use]
    pub fn channel(&self, channel_id: &str) -> Option<&VoiceChannel> {
        self.channels.get(channel_id)
    }

    /// Every tracked channel, in stable id order.
    pub fn channels(&self) -> impl Iterator<Item = &VoiceChannel> {
        self.channels.values()
    }

    /// Apply one event. `target = None` means the user left voice (or the
    /// claimed channel could not be resolved, which reads the same way).
    pub fn apply_event(
        &mut self,
        target: Option<&Channel>,
        occupant: OccupantState,
    ) -> VoiceTransition {
        match target {
            None => self.remove_occupant(&occupant.user_id),
            Some(channel) => self.upsert_occupant(channel, occupant),
        }
    }

    fn channel_holding(&self, user_id: &str) -> Option<String> {
        self.channels
            .values()
            .find(|c| c.occupants.iter().any(|o| o.user_id == user_id))
            .map(|c| c.id.clone())
    }

    fn remove_occupant(&mut self, user_id: &str) -> VoiceTransition {
        let Some(channel_id) = self.channel_holding(user_id) else {
            return VoiceTransition::NoOp;
        };
        let Some(channel) = self.channels.get_mut(&channel_id) else {
            return VoiceTransition::NoOp;
        };
        channel.occupants.retain(|o| o.user_id != user_id);
        if channel.occupants.is_empty() {
            VoiceTransition::Emptied { channel_id }
        } else {
            VoiceTransition::Left { channel_id }
        }
    }

    fn upsert_occupant(&mut self, target: &Channel, occupant: OccupantState) -> VoiceTransition {
        let previous = self.channel_holding(&occupant.user_id);
        let previously_tracked = previous.is_some();

        // A move drops the occupant from the old channel first.
        if let Some(old_channel_id) = previous
            && old_channel_id != target.id
            && let Some(old) = self.channels.get_mut(&old_channel_id)
        {
            old.occupants.retain(|o| o.user_id != occupant.user_id);
        }

        let channel = self
            .channels
            .entry(target.id.clone())
            .or_insert_with(|| VoiceChannel {
                id: target.id.clone(),
                name: target.name.clone(),
                occupants: Vec::new(),
            });
        channel.name = target.name.clone();

        match channel
            .occupants
            .iter_mut()
            .find(|o| o.user_id == occupant.user_id)
        {
            Some(existing) => *existing = occupant,
            None => channel.occupants.push(occupant),
        }

        if previously_tracked {
            VoiceTransition::StateChanged {
                channel_id: target.id.clone(),
            }
        } else {
            VoiceTransition::Entered {
                channel_id: target.id.clone(),
            }
        }
    }
}
