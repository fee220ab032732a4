use serde::{Deserialize, Serialize};

/// Origin platform user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub bot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Guild membership: per-guild nickname on top of the user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Member {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
}

impl Member {
    /// Guild nickname falling back to the account username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.user.username,
        }
    }
}

/// Origin channel metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

/// One attachment on an origin message, copied 1:1 when mirrored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proxy_url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Reference to another message (reply target).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageReference {
    pub channel_id: String,
    pub message_id: String,
}

/// Aggregated reaction state on a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
}

/// An origin message, as delivered by push or refetched over REST.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub guild_id: String,
    pub author: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    pub content: String,
    /// Opaque creation timestamp, used verbatim in anchor tokens.
    pub timestamp: String,
    pub attachments: Vec<Attachment>,
    /// Embeds pass through to the relay without interpretation.
    pub embeds: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<MessageReference>,
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Nickname falling back to username, as shown in mirrored display names.
    #[must_use]
    pub fn author_display_name(&self) -> &str {
        match &self.member {
            Some(member) => match member.nick.as_deref() {
                Some(nick) if !nick.is_empty() => nick,
                _ => &self.author.username,
            },
            None => &self.author.username,
        }
    }
}

/// A voice-state push event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VoiceStateEvent {
    pub user_id: String,
    /// Target voice channel; empty when the user left voice entirely.
    pub channel_id: String,
    pub guild_id: String,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub server_mute: bool,
}

impl VoiceStateEvent {
    /// Whether the event carries no target channel (a leave).
    #[must_use]
    pub fn left_voice(&self) -> bool {
        self.channel_id.is_empty()
    }
}

/// A reaction push event; all three kinds carry the same addressing triple.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReactionEvent {
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
}

/// Push events delivered by the origin session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginEvent {
    MessageCreate(Message),
    VoiceStateUpdate(VoiceStateEvent),
    ReactionAdd(ReactionEvent),
    ReactionRemove(ReactionEvent),
    ReactionRemoveAll(ReactionEvent),
}
