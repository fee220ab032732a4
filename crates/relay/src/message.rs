use serde::{Deserialize, Serialize};

/// Webhook credentials for one relay channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhookHandle {
    pub id: String,
    pub token: String,
}

/// Rich-content blocks rendered by the relay platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Plain text body section.
    Section { text: String },
    /// Small-print annotation line.
    Context { text: String },
    /// Inline-rendered image.
    Image { url: String, title: String },
    /// Reference to a registered remote file.
    FileRef { external_id: String },
}

impl Block {
    #[must_use]
    pub fn section(text: impl Into<String>) -> Self {
        Self::Section { text: text.into() }
    }

    #[must_use]
    pub fn context(text: impl Into<String>) -> Self {
        Self::Context { text: text.into() }
    }

    #[must_use]
    pub fn image(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self::Image {
            url: url.into(),
            title: title.into(),
        }
    }

    #[must_use]
    pub fn file_ref(external_id: impl Into<String>) -> Self {
        Self::FileRef {
            external_id: external_id.into(),
        }
    }
}

/// Attachment descriptor carried on relay messages, copied 1:1 from the
/// originating message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageAttachment {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proxy_url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// A relay-platform message, both outbound payload and wire response shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayMessage {
    /// Destination channel key.
    pub channel: String,
    /// Platform-assigned id; present on sent/edited/fetched messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
    /// Origin embeds passed through verbatim.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<serde_json::Value>,
    pub unfurl_links: bool,
    pub unfurl_media: bool,
    pub link_names: bool,
}

impl RelayMessage {
    /// Empty message addressed to a channel.
    #[must_use]
    pub fn in_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }
}

/// One uploaded file accompanying a webhook send or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RelayFile {
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/octet-stream".into(),
            bytes,
        }
    }
}

/// Parameters for registering an externally-hosted file with the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilesRemoteAddParams {
    pub external_id: String,
    pub external_url: String,
    pub title: String,
    pub filetype: String,
}

/// Relay filetype token derived from a filename extension.
#[must_use]
pub fn file_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "png",
        "jpg" | "jpeg" => "jpg",
        "gif" => "gif",
        "pdf" => "pdf",
        "txt" | "log" => "text",
        "md" => "markdown",
        "zip" => "zip",
        "mp3" => "mp3",
        "mp4" => "mp4",
        "wav" => "wav",
        "json" => "json",
        "csv" => "csv",
        _ => "binary",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_blocks_with_type_tag() {
        let msg = RelayMessage {
            channel: "general".into(),
            text: "hi".into(),
            blocks: vec![Block::image("https://x/a.png", "a.png"), Block::file_ref("ext:1")],
            ..RelayMessage::default()
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["blocks"][0]["type"], "image");
        assert_eq!(json["blocks"][1]["external_id"], "ext:1");
        // unset optional fields stay off the wire
        assert!(json.get("id").is_none());
        assert!(json.get("username").is_none());
    }

    #[test]
    fn response_shape_round_trips() {
        let wire = r#"{"channel": "general", "id": "1700000000.1", "text": "hi"}"#;
        let msg: RelayMessage = serde_json::from_str(wire).unwrap();
        assert_eq!(msg.id.as_deref(), Some("1700000000.1"));
        assert!(msg.blocks.is_empty());
    }

    #[test]
    fn file_types_map_by_extension() {
        assert_eq!(file_type_for("report.PDF"), "pdf");
        assert_eq!(file_type_for("notes.txt"), "text");
        assert_eq!(file_type_for("archive.tar.zst"), "binary");
        assert_eq!(file_type_for("no-extension"), "binary");
    }
}
