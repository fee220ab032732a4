//! Voice presence tracking: per-guild occupancy state and the single live
//! status message each routed relay channel carries.

pub mod render;
pub mod state;
pub mod tracker;

pub use state::{GuildVoiceState, OccupantState, VoiceChannel, VoiceTransition};
pub use tracker::PresenceTracker;
