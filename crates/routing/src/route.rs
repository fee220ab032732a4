use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// Origin-channel value marking a route that aggregates every voice channel
/// in its guild into one relay summary.
pub const AGGREGATE_CHANNEL: &str = "all";

/// Per-route feature flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouteFlags {
    /// Mirror origin messages into the relay channel.
    pub forward_origin_to_relay: bool,
    /// Prefix mirrored content with the origin channel name.
    pub show_channel_name: bool,
    /// Maintain a voice status message in the relay channel.
    pub send_voice_state: bool,
    /// Broadcast mute/deafen changes, not just joins and leaves.
    pub send_mute_state: bool,
}

/// One origin channel (or the guild-wide aggregate) mapped to a relay channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRoute {
    /// Origin channel id, or [`AGGREGATE_CHANNEL`].
    pub origin_channel: String,
    pub guild_id: String,
    /// Destination relay channel key.
    pub relay_channel: String,
    #[serde(default)]
    pub flags: RouteFlags,
}

impl ChannelRoute {
    /// Whether this route aggregates all of the guild's voice channels.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.origin_channel == AGGREGATE_CHANNEL
    }
}

/// Route lookup, owned externally and consulted fresh on every event.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Resolve the route for an origin channel, falling back to the guild's
    /// aggregate route when no channel-specific one exists.
    async fn find_route(&self, origin_channel_id: &str, guild_id: &str) -> Option<ChannelRoute>;
}

/// Immutable in-memory route table.
#[derive(Debug, Default)]
pub struct StaticRouteTable {
    by_channel: HashMap<(String, String), ChannelRoute>,
}

impl StaticRouteTable {
    #[must_use]
    pub fn new(routes: Vec<ChannelRoute>) -> Self {
        let by_channel = routes
            .into_iter()
            .map(|r| ((r.origin_channel.clone(), r.guild_id.clone()), r))
            .collect();
        Self { by_channel }
    }

    /// Parse a JSON array of routes.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let routes: Vec<ChannelRoute> = serde_json::from_str(json)?;
        Ok(Self::new(routes))
    }
}

#[async_trait]
impl RouteStore for StaticRouteTable {
    async fn find_route(&self, origin_channel_id: &str, guild_id: &str) -> Option<ChannelRoute> {
        let exact = (origin_channel_id.to_string(), guild_id.to_string());
        if let Some(route) = self.by_channel.get(&exact) {
            return Some(route.clone());
        }
        let aggregate = (AGGREGATE_CHANNEL.to_string(), guild_id.to_string());
        self.by_channel.get(&aggregate).cloned()
    }
}
