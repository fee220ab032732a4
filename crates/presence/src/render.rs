//! Occupancy rendering for status messages.

use {
    crate::state::{GuildVoiceState, OccupantState, VoiceChannel},
    crosstalk_relay::Block,
};

fn occupant_line(occupant: &OccupantState) -> String {
    // Deafened implies not hearing, which outranks not speaking.
    if occupant.deafened {
        format!("• {} (deafened)", occupant.display_name)
    } else if occupant.muted {
        format!("• {} (muted)", occupant.display_name)
    } else {
        format!("• {}", occupant.display_name)
    }
}

fn channel_section(channel: &VoiceChannel) -> Block {
    let mut text = format!("*{}*", channel.name);
    if channel.occupants.is_empty() {
        text.push_str("\n_empty_");
    } else {
        for occupant in &channel.occupants {
            text.push('\n');
            text.push_str(&occupant_line(occupant));
        }
    }
    Block::section(text)
}

/// Blocks for a route watching one voice channel.
#[must_use]
pub fn single_channel_blocks(channel: &VoiceChannel) -> Vec<Block> {
    vec![channel_section(channel)]
}

/// Blocks for a guild-wide aggregate route: one section per tracked
/// channel, in stable order.
#[must_use]
pub fn guild_blocks(state: &GuildVoiceState) -> Vec<Block> {
    state.channels().map(channel_section).collect()
}
