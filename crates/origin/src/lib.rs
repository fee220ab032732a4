//! Origin-platform data model and REST client.
//!
//! The origin platform pushes native events (message create, voice state,
//! reactions) into the bridge; everything else — message fetch, member
//! lookup, deletion, attachment download — goes through its REST API.
//! Session management and credential bootstrap live outside this system;
//! events arrive already decoded as [`OriginEvent`] values.

pub mod rest;
pub mod types;

pub use rest::{HttpOriginClient, OriginApi};
pub use types::{
    Attachment, Channel, Member, Message, MessageReference, OriginEvent, Reaction, ReactionEvent,
    User, VoiceStateEvent,
};
