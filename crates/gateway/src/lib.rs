//! Event dispatch: fans origin push events out to the mirror, presence,
//! and reaction services, one task per event, and services the out-of-band
//! control channel.

pub mod bridge;

pub use bridge::{Bridge, ControlCommand};
