//! Content shaping for mirrored messages: mention tokens, quote prefixes,
//! channel-name prefixes, and attachment classification.

use {regex::Regex, std::sync::LazyLock};

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").unwrap_or_else(|e| panic!("user mention regex: {e}")));

static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#(\d+)>").unwrap_or_else(|e| panic!("channel mention regex: {e}")));

/// Extensions rendered inline by the relay; everything else is a file.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Whether an attachment renders inline as an image.
#[must_use]
pub fn is_image_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// User ids referenced by mention tokens, in order of first appearance.
#[must_use]
pub fn user_mention_ids(content: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for captures in USER_MENTION.captures_iter(content) {
        let id = captures[1].to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Replace both mention token forms for one user with `@display_name`.
#[must_use]
pub fn replace_user_mention(content: &str, user_id: &str, display_name: &str) -> String {
    content
        .replace(&format!("<@!{user_id}>"), &format!("@{display_name}"))
        .replace(&format!("<@{user_id}>"), &format!("@{display_name}"))
}

/// Channel ids referenced by mention tokens, in order of first appearance.
#[must_use]
pub fn channel_mention_ids(content: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for captures in CHANNEL_MENTION.captures_iter(content) {
        let id = captures[1].to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Replace a channel mention token with a relay hyperlink `<link|#name>`.
#[must_use]
pub fn replace_channel_mention(content: &str, channel_id: &str, link: &str, name: &str) -> String {
    content.replace(&format!("<#{channel_id}>"), &format!("<{link}|#{name}>"))
}

/// One-line quote of a referenced message: its first line, marked when the
/// original continues past it.
#[must_use]
pub fn quote_line(referenced_content: &str) -> String {
    match referenced_content.split_once('\n') {
        Some((first, _)) => format!("> {first}..."),
        None => format!("> {referenced_content}"),
    }
}

/// Channel-name prefix shown when a route forwards several origin channels.
#[must_use]
pub fn channel_name_prefix(channel_name: &str) -> String {
    format!("`#{channel_name}` ")
}
