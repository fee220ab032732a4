use {
    std::sync::Arc,
    tracing::{debug, info, warn},
};

use {
    crosstalk_common::{Error, PROGRAM_NAME, Result},
    crosstalk_origin::{Attachment, Message, MessageReference, OriginApi},
    crosstalk_relay::{
        Block, FilesRemoteAddParams, MessageAttachment, RelayFile, RelayMessage, RelayTransport,
        file_type_for,
    },
    crosstalk_routing::{ChannelRoute, IdentityLinker, RouteStore},
};

use crate::{anchor, content, rewrite, rewrite::RewriteParse};

/// What handling an origin message amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Bot-authored, unrouted, or forwarding disabled.
    Ignored,
    /// Mirrored into the relay channel (create path).
    Mirrored,
    /// A rewrite command was applied to its referenced message.
    RewriteApplied,
}

/// Explicit result of the rewrite-command detection path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RewriteOutcome {
    NotACommand,
    Handled,
    Rejected(String),
}

/// Mirrors origin messages into relay channels and applies rewrite commands.
pub struct MessageMirror {
    origin: Arc<dyn OriginApi>,
    relay: Arc<dyn RelayTransport>,
    routes: Arc<dyn RouteStore>,
    identity: Arc<dyn IdentityLinker>,
    bot_user_id: String,
}

impl MessageMirror {
    #[must_use]
    pub fn new(
        origin: Arc<dyn OriginApi>,
        relay: Arc<dyn RelayTransport>,
        routes: Arc<dyn RouteStore>,
        identity: Arc<dyn IdentityLinker>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            relay,
            routes,
            identity,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Handle one message-create event end to end.
    pub async fn handle_message(&self, message: &Message) -> Result<MirrorOutcome> {
        if message.author.id == self.bot_user_id || message.author.bot {
            return Ok(MirrorOutcome::Ignored);
        }
        let Some(route) = self
            .routes
            .find_route(&message.channel_id, &message.guild_id)
            .await
        else {
            return Ok(MirrorOutcome::Ignored);
        };
        if !route.flags.forward_origin_to_relay {
            return Ok(MirrorOutcome::Ignored);
        }

        let referenced = match &message.reference {
            Some(reference) => Some(
                self.origin
                    .get_message(&reference.channel_id, &reference.message_id)
                    .await
                    .map_err(|e| Error::transport("fetching referenced message", e))?,
            ),
            None => None,
        };

        if let (Some(reference), Some(referenced)) = (&message.reference, referenced.as_ref()) {
            match self.try_rewrite(message, reference, referenced).await? {
                RewriteOutcome::Handled => return Ok(MirrorOutcome::RewriteApplied),
                RewriteOutcome::Rejected(reason) => {
                    warn!(
                        author = %message.author.id,
                        message_id = %message.id,
                        reason = %reason,
                        "rewrite command rejected"
                    );
                    return Err(Error::validation(reason));
                },
                RewriteOutcome::NotACommand => {},
            }
        }

        self.mirror_create(message, &route, referenced.as_ref())
            .await
    }

    /// Rewrite-command path: only taken when the body parses as a command.
    /// Rejections abort the whole event before any side effect.
    async fn try_rewrite(
        &self,
        message: &Message,
        reference: &MessageReference,
        referenced: &Message,
    ) -> Result<RewriteOutcome> {
        let command = match rewrite::parse_command(&message.content) {
            RewriteParse::NotACommand => return Ok(RewriteOutcome::NotACommand),
            RewriteParse::Malformed => {
                return Ok(RewriteOutcome::Rejected("malformed rewrite expression".into()));
            },
            RewriteParse::Command(command) => command,
        };

        // The mirrored message's display name carries the author's primary
        // id; the command author must be one of its linked origin ids.
        let Some(primary) = anchor::primary_id_from_display(&referenced.author.username) else {
            return Ok(RewriteOutcome::Rejected(
                "referenced message carries no primary id".into(),
            ));
        };
        let linked = match self.identity.linked_ids(primary).await {
            Ok(linked) => linked,
            Err(error) => {
                debug!(primary, error = %error, "linked-id lookup failed");
                return Ok(RewriteOutcome::Rejected(format!(
                    "no linked identities for {primary}"
                )));
            },
        };
        if !linked.iter().any(|id| *id == message.author.id) {
            return Ok(RewriteOutcome::Rejected(format!(
                "author {} is not linked to {primary}",
                message.author.id
            )));
        }

        // Authorized: the command message itself disappears from the origin.
        if let Err(error) = self
            .origin
            .delete_message(&message.channel_id, &message.id)
            .await
        {
            warn!(message_id = %message.id, error = %error, "deleting rewrite command failed");
        }

        let (inner, wrapper) = anchor::unwrap_quoted(&referenced.content);
        let rewritten = rewrite::apply(&command, &inner);
        let text = match &wrapper {
            Some(wrapper) => anchor::rewrap(&rewritten, wrapper),
            None => rewritten,
        };

        let edit = RelayMessage {
            text,
            attachments: referenced.attachments.iter().map(to_relay_attachment).collect(),
            ..RelayMessage::in_channel(reference.channel_id.as_str())
        };
        self.relay
            .edit(&reference.channel_id, &reference.message_id, edit, Vec::new())
            .await
            .map_err(|e| Error::transport("pushing rewrite edit", e))?;

        info!(
            message_id = %reference.message_id,
            pattern = %command.pattern,
            "rewrite applied"
        );
        Ok(RewriteOutcome::Handled)
    }

    /// Default path: mirror the message into the route's relay channel,
    /// then remove the origin copy.
    async fn mirror_create(
        &self,
        message: &Message,
        route: &ChannelRoute,
        referenced: Option<&Message>,
    ) -> Result<MirrorOutcome> {
        let display_name = message.author_display_name();
        let primary = match self.identity.primary_id(&message.author.id).await {
            Ok(primary) => primary,
            Err(error) => {
                debug!(user_id = %message.author.id, error = %error, "falling back to origin id");
                message.author.id.clone()
            },
        };
        let username = format!("{display_name}({primary})");

        let mut text = message.content.clone();

        for user_id in content::user_mention_ids(&text) {
            match self
                .origin
                .get_guild_member(&message.guild_id, &user_id)
                .await
            {
                Ok(member) => {
                    text = content::replace_user_mention(&text, &user_id, member.display_name());
                },
                Err(error) => {
                    debug!(user_id = %user_id, error = %error, "user mention left verbatim");
                },
            }
        }
        for channel_id in content::channel_mention_ids(&text) {
            match self.origin.get_channel(&channel_id).await {
                Ok(channel) => {
                    let link = self.origin.channel_link(&message.guild_id, &channel_id);
                    text = content::replace_channel_mention(&text, &channel_id, &link, &channel.name);
                },
                Err(error) => {
                    debug!(channel_id = %channel_id, error = %error, "channel mention left verbatim");
                },
            }
        }

        if let Some(referenced) = referenced {
            let link =
                self.origin
                    .message_link(&message.guild_id, &referenced.channel_id, &referenced.id);
            text = format!(
                "{}\n{text}\n{}",
                content::quote_line(&referenced.content),
                anchor::quote_anchor(&link)
            );
        }

        if route.flags.show_channel_name {
            match self.origin.get_channel(&message.channel_id).await {
                Ok(channel) => {
                    text = format!("{}{text}", content::channel_name_prefix(&channel.name));
                },
                Err(error) => {
                    warn!(channel_id = %message.channel_id, error = %error, "channel name prefix skipped");
                },
            }
        }

        text.push_str(&anchor::timestamp_anchor(&message.timestamp));

        let mut files = Vec::new();
        let mut kept = Vec::new();
        let mut image_blocks = Vec::new();
        let mut file_blocks = Vec::new();
        for attachment in &message.attachments {
            let bytes = match self.origin.download_attachment(&attachment.url).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(
                        attachment_id = %attachment.id,
                        filename = %attachment.filename,
                        error = %error,
                        "attachment download failed, dropped"
                    );
                    continue;
                },
            };
            files.push(RelayFile::new(attachment.filename.clone(), bytes));
            kept.push(to_relay_attachment(attachment));

            if content::is_image_filename(&attachment.filename) {
                image_blocks.push(Block::image(
                    attachment.url.clone(),
                    attachment.filename.clone(),
                ));
            } else {
                let external_id =
                    format!("{PROGRAM_NAME}:{}/{}", message.channel_id, attachment.id);
                let params = FilesRemoteAddParams {
                    external_id: external_id.clone(),
                    external_url: attachment.url.clone(),
                    title: attachment.filename.clone(),
                    filetype: file_type_for(&attachment.filename).to_string(),
                };
                match self.relay.files_remote_add(params).await {
                    Ok(_) => file_blocks.push(Block::file_ref(external_id)),
                    Err(error) => {
                        warn!(
                            attachment_id = %attachment.id,
                            error = %error,
                            "remote file registration failed, link skipped"
                        );
                    },
                }
            }
        }

        let mut blocks = Vec::new();
        if (!image_blocks.is_empty() || !file_blocks.is_empty()) && !message.content.is_empty() {
            blocks.push(Block::context(text.clone()));
        }
        blocks.extend(image_blocks);
        blocks.extend(file_blocks);

        let relay_message = RelayMessage {
            username: Some(username),
            icon_url: message.author.avatar_url.clone(),
            text,
            blocks,
            attachments: kept,
            embeds: message.embeds.clone(),
            unfurl_links: true,
            unfurl_media: true,
            link_names: true,
            ..RelayMessage::in_channel(route.relay_channel.as_str())
        };

        // Send first; the origin copy goes away regardless of the outcome.
        // A failed send with a successful delete loses the message — the
        // accepted at-most-once degradation.
        match self
            .relay
            .send(&route.relay_channel, relay_message, true, files)
            .await
        {
            Ok(sent) => {
                debug!(channel = %route.relay_channel, id = ?sent.id, "message mirrored");
            },
            Err(error) => {
                warn!(
                    channel = %route.relay_channel,
                    error = %error,
                    "relay send failed; origin copy is still removed"
                );
            },
        }

        if let Err(error) = self
            .origin
            .delete_message(&message.channel_id, &message.id)
            .await
        {
            warn!(
                channel_id = %message.channel_id,
                message_id = %message.id,
                error = %error,
                "removing mirrored origin message failed"
            );
        }

        Ok(MirrorOutcome::Mirrored)
    }
}

fn to_relay_attachment(attachment: &Attachment) -> MessageAttachment {
    MessageAttachment {
        id: attachment.id.clone(),
        url: attachment.url.clone(),
        proxy_url: attachment.proxy_url.clone(),
        filename: attachment.filename.clone(),
        width: attachment.width,
        height: attachment.height,
        size: attachment.size,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        anyhow::Result as AnyResult,
        async_trait::async_trait,
        crosstalk_origin::{Channel, Member, User},
        crosstalk_routing::{RouteFlags, StaticIdentityTable, StaticRouteTable},
        std::{
            collections::HashMap,
            sync::{Arc, Mutex},
        },
    };

    #[derive(Default)]
    struct FakeOrigin {
        messages: HashMap<(String, String), Message>,
        members: HashMap<(String, String), Member>,
        channels: HashMap<String, Channel>,
        attachments: HashMap<String, Vec<u8>>,
        deleted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl OriginApi for FakeOrigin {
        async fn get_message(&self, channel_id: &str, message_id: &str) -> AnyResult<Message> {
            self.messages
                .get(&(channel_id.to_string(), message_id.to_string()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown message {message_id}"))
        }

        async fn get_guild_member(&self, guild_id: &str, user_id: &str) -> AnyResult<Member> {
            self.members
                .get(&(guild_id.to_string(), user_id.to_string()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown member {user_id}"))
        }

        async fn get_channel(&self, channel_id: &str) -> AnyResult<Channel> {
            self.channels
                .get(channel_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown channel {channel_id}"))
        }

        async fn delete_message(&self, channel_id: &str, message_id: &str) -> AnyResult<()> {
            self.deleted
                .lock()
                .unwrap()
                .push((channel_id.to_string(), message_id.to_string()));
            Ok(())
        }

        async fn download_attachment(&self, url: &str) -> AnyResult<Vec<u8>> {
            self.attachments
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("download failed: {url}"))
        }

        fn message_link(&self, guild_id: &str, channel_id: &str, message_id: &str) -> String {
            format!("https://origin.example/channels/{guild_id}/{channel_id}/{message_id}")
        }

        fn channel_link(&self, guild_id: &str, channel_id: &str) -> String {
            format!("https://origin.example/channels/{guild_id}/{channel_id}")
        }
    }

    #[derive(Default)]
    struct FakeRelay {
        sends: Mutex<Vec<(String, RelayMessage, bool, usize)>>,
        edits: Mutex<Vec<(String, String, RelayMessage)>>,
        file_adds: Mutex<Vec<FilesRemoteAddParams>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl RelayTransport for FakeRelay {
        async fn send(
            &self,
            channel: &str,
            message: RelayMessage,
            wait: bool,
            files: Vec<RelayFile>,
        ) -> AnyResult<RelayMessage> {
            if self.fail_sends {
                anyhow::bail!("relay unavailable");
            }
            let mut sent = message.clone();
            sent.id = Some("sent-1".into());
            self.sends
                .lock()
                .unwrap()
                .push((channel.to_string(), message, wait, files.len()));
            Ok(sent)
        }

        async fn edit(
            &self,
            channel: &str,
            message_id: &str,
            message: RelayMessage,
            _files: Vec<RelayFile>,
        ) -> AnyResult<RelayMessage> {
            self.edits.lock().unwrap().push((
                channel.to_string(),
                message_id.to_string(),
                message.clone(),
            ));
            Ok(message)
        }

        async fn update(&self, _message: RelayMessage) -> AnyResult<String> {
            anyhow::bail!("not used by the mirror")
        }

        async fn remove(&self, _channel: &str, _message_id: &str) -> AnyResult<()> {
            anyhow::bail!("not used by the mirror")
        }

        async fn files_remote_add(&self, params: FilesRemoteAddParams) -> AnyResult<String> {
            self.file_adds.lock().unwrap().push(params.clone());
            Ok(format!("ref-{}", params.external_id))
        }

        async fn history(&self, _channel: &str, _limit: u32) -> AnyResult<Vec<RelayMessage>> {
            Ok(Vec::new())
        }
    }

    const BOT_ID: &str = "bot-1";

    fn routed_flags(flags: RouteFlags) -> Arc<StaticRouteTable> {
        Arc::new(StaticRouteTable::new(vec![ChannelRoute {
            origin_channel: "c1".into(),
            guild_id: "g1".into(),
            relay_channel: "general".into(),
            flags,
        }]))
    }

    fn routes() -> Arc<StaticRouteTable> {
        routed_flags(RouteFlags {
            forward_origin_to_relay: true,
            ..RouteFlags::default()
        })
    }

    fn identity() -> Arc<StaticIdentityTable> {
        let mut links = HashMap::new();
        links.insert("alice".to_string(), vec!["u-a".to_string()]);
        links.insert("bob".to_string(), vec!["u-b".to_string()]);
        Arc::new(StaticIdentityTable::new(links))
    }

    fn mirror_with(origin: FakeOrigin, relay: FakeRelay) -> (MessageMirror, Arc<FakeRelay>, Arc<FakeOrigin>) {
        let origin = Arc::new(origin);
        let relay = Arc::new(relay);
        let mirror = MessageMirror::new(
            Arc::clone(&origin) as Arc<dyn OriginApi>,
            Arc::clone(&relay) as Arc<dyn RelayTransport>,
            routes(),
            identity(),
            BOT_ID,
        );
        (mirror, relay, origin)
    }

    fn user_message(content: &str) -> Message {
        Message {
            id: "m1".into(),
            channel_id: "c1".into(),
            guild_id: "g1".into(),
            author: User {
                id: "u-a".into(),
                username: "alice-origin".into(),
                ..User::default()
            },
            member: Some(Member {
                nick: Some("A".into()),
                ..Member::default()
            }),
            content: content.into(),
            timestamp: "1700000000.000100".into(),
            ..Message::default()
        }
    }

    #[tokio::test]
    async fn mirrors_and_deletes_the_origin_copy() {
        let (mirror, relay, origin) = mirror_with(FakeOrigin::default(), FakeRelay::default());

        let outcome = mirror.handle_message(&user_message("hello")).await.unwrap();

        assert_eq!(outcome, MirrorOutcome::Mirrored);
        let sends = relay.sends.lock().unwrap();
        let (channel, sent, wait, file_count) = &sends[0];
        assert_eq!(sends.len(), 1);
        assert_eq!(channel, "general");
        assert!(*wait);
        assert_eq!(*file_count, 0);
        assert_eq!(sent.username.as_deref(), Some("A(alice)"));
        assert!(sent.text.starts_with("hello"));
        assert_eq!(
            anchor::extract_timestamp(&sent.text),
            Some("1700000000.000100")
        );
        assert_eq!(
            *origin.deleted.lock().unwrap(),
            vec![("c1".to_string(), "m1".to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_primary_falls_back_to_origin_id() {
        let (mirror, relay, _) = mirror_with(FakeOrigin::default(), FakeRelay::default());
        let mut message = user_message("hi");
        message.author.id = "u-unlinked".into();

        mirror.handle_message(&message).await.unwrap();

        let sends = relay.sends.lock().unwrap();
        assert_eq!(sends[0].1.username.as_deref(), Some("A(u-unlinked)"));
    }

    #[tokio::test]
    async fn bot_authors_and_unrouted_channels_are_ignored() {
        let (mirror, relay, origin) = mirror_with(FakeOrigin::default(), FakeRelay::default());

        let mut from_bot = user_message("hi");
        from_bot.author.id = BOT_ID.into();
        assert_eq!(
            mirror.handle_message(&from_bot).await.unwrap(),
            MirrorOutcome::Ignored
        );

        let mut bot_flagged = user_message("hi");
        bot_flagged.author.bot = true;
        assert_eq!(
            mirror.handle_message(&bot_flagged).await.unwrap(),
            MirrorOutcome::Ignored
        );

        let mut unrouted = user_message("hi");
        unrouted.channel_id = "c-unrouted".into();
        assert_eq!(
            mirror.handle_message(&unrouted).await.unwrap(),
            MirrorOutcome::Ignored
        );

        assert!(relay.sends.lock().unwrap().is_empty());
        assert!(origin.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_forwarding_is_ignored() {
        let origin = Arc::new(FakeOrigin::default());
        let relay = Arc::new(FakeRelay::default());
        let mirror = MessageMirror::new(
            Arc::clone(&origin) as Arc<dyn OriginApi>,
            Arc::clone(&relay) as Arc<dyn RelayTransport>,
            routed_flags(RouteFlags::default()),
            identity(),
            BOT_ID,
        );

        let outcome = mirror.handle_message(&user_message("hi")).await.unwrap();
        assert_eq!(outcome, MirrorOutcome::Ignored);
        assert!(relay.sends.lock().unwrap().is_empty());
    }

    fn mirrored_target() -> Message {
        // A previously mirrored message: webhook identity with primary id.
        Message {
            id: "m-ref".into(),
            channel_id: "c1".into(),
            guild_id: "g1".into(),
            author: User {
                id: "wh".into(),
                username: "A(alice)".into(),
                bot: true,
                ..User::default()
            },
            content: "foo baz foo".into(),
            timestamp: "1690000000.000200".into(),
            ..Message::default()
        }
    }

    fn rewrite_command_message(author_id: &str, body: &str) -> Message {
        let mut message = user_message(body);
        message.id = "m-cmd".into();
        message.author.id = author_id.into();
        message.reference = Some(MessageReference {
            channel_id: "c1".into(),
            message_id: "m-ref".into(),
        });
        message
    }

    #[tokio::test]
    async fn rewrite_replaces_all_occurrences_and_edits_in_place() {
        let mut origin = FakeOrigin::default();
        origin
            .messages
            .insert(("c1".into(), "m-ref".into()), mirrored_target());
        let (mirror, relay, origin) = mirror_with(origin, FakeRelay::default());

        let outcome = mirror
            .handle_message(&rewrite_command_message("u-a", "ss/foo/bar/"))
            .await
            .unwrap();

        assert_eq!(outcome, MirrorOutcome::RewriteApplied);
        let edits = relay.edits.lock().unwrap();
        let (channel, message_id, edited) = &edits[0];
        assert_eq!(edits.len(), 1);
        assert_eq!(channel, "c1");
        assert_eq!(message_id, "m-ref");
        assert_eq!(edited.text, "bar baz bar");
        // the command message is gone; nothing else was sent
        assert_eq!(
            *origin.deleted.lock().unwrap(),
            vec![("c1".to_string(), "m-cmd".to_string())]
        );
        assert!(relay.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rewrite_preserves_the_quote_wrapper() {
        let quote_anchor = anchor::quote_anchor("https://origin.example/channels/g1/c1/m0");
        let mut target = mirrored_target();
        target.content = format!("> quoted...\nfoo inside\n{quote_anchor}");
        let mut origin = FakeOrigin::default();
        origin.messages.insert(("c1".into(), "m-ref".into()), target);
        let (mirror, relay, _) = mirror_with(origin, FakeRelay::default());

        mirror
            .handle_message(&rewrite_command_message("u-a", "ss/foo/bar/"))
            .await
            .unwrap();

        let edits = relay.edits.lock().unwrap();
        assert_eq!(
            edits[0].2.text,
            format!("> quoted...\nbar inside\n{quote_anchor}")
        );
    }

    #[tokio::test]
    async fn unlinked_author_cannot_rewrite() {
        let mut origin = FakeOrigin::default();
        origin
            .messages
            .insert(("c1".into(), "m-ref".into()), mirrored_target());
        let (mirror, relay, origin) = mirror_with(origin, FakeRelay::default());

        // u-b is linked to bob, not to alice who owns the target.
        let err = mirror
            .handle_message(&rewrite_command_message("u-b", "ss/foo/bar/"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert!(relay.edits.lock().unwrap().is_empty());
        assert!(relay.sends.lock().unwrap().is_empty());
        assert!(origin.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_expression_aborts_without_mutation() {
        let mut origin = FakeOrigin::default();
        origin
            .messages
            .insert(("c1".into(), "m-ref".into()), mirrored_target());
        let (mirror, relay, origin) = mirror_with(origin, FakeRelay::default());

        let err = mirror
            .handle_message(&rewrite_command_message("u-a", "ss/onlyone"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert!(relay.edits.lock().unwrap().is_empty());
        assert!(origin.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replies_that_are_not_commands_mirror_with_quote_wrapper() {
        let mut origin = FakeOrigin::default();
        origin
            .messages
            .insert(("c1".into(), "m-ref".into()), mirrored_target());
        let (mirror, relay, _) = mirror_with(origin, FakeRelay::default());

        mirror
            .handle_message(&rewrite_command_message("u-a", "sounds good"))
            .await
            .unwrap();

        let sends = relay.sends.lock().unwrap();
        let text = &sends[0].1.text;
        assert!(text.starts_with("> foo baz foo\nsounds good\n(ref: <https://origin.example/channels/g1/c1/m-ref>)"));
    }

    #[tokio::test]
    async fn attachments_classify_download_and_register() {
        let mut origin = FakeOrigin::default();
        origin
            .attachments
            .insert("https://cdn/shot.png".into(), vec![1, 2]);
        origin
            .attachments
            .insert("https://cdn/report.pdf".into(), vec![3, 4, 5]);
        let (mirror, relay, _) = mirror_with(origin, FakeRelay::default());

        let mut message = user_message("see these");
        message.attachments = vec![
            Attachment {
                id: "a1".into(),
                url: "https://cdn/shot.png".into(),
                filename: "shot.png".into(),
                ..Attachment::default()
            },
            Attachment {
                id: "a2".into(),
                url: "https://cdn/report.pdf".into(),
                filename: "report.pdf".into(),
                ..Attachment::default()
            },
        ];

        mirror.handle_message(&message).await.unwrap();

        let file_adds = relay.file_adds.lock().unwrap();
        assert_eq!(file_adds.len(), 1);
        assert_eq!(file_adds[0].external_id, "crosstalk:c1/a2");
        assert_eq!(file_adds[0].filetype, "pdf");

        let sends = relay.sends.lock().unwrap();
        let (_, sent, _, file_count) = &sends[0];
        assert_eq!(*file_count, 2);
        assert_eq!(sent.attachments.len(), 2);
        assert_eq!(sent.attachments[0].id, "a1");
        // context block first, then the image, then the file link
        assert!(matches!(sent.blocks[0], Block::Context { .. }));
        assert!(matches!(sent.blocks[1], Block::Image { .. }));
        assert!(matches!(
            sent.blocks[2],
            Block::FileRef { ref external_id } if external_id == "crosstalk:c1/a2"
        ));
    }

    #[tokio::test]
    async fn failed_download_drops_only_that_attachment() {
        let mut origin = FakeOrigin::default();
        origin
            .attachments
            .insert("https://cdn/ok.png".into(), vec![9]);
        let (mirror, relay, _) = mirror_with(origin, FakeRelay::default());

        let mut message = user_message("mixed");
        message.attachments = vec![
            Attachment {
                id: "a1".into(),
                url: "https://cdn/missing.png".into(),
                filename: "missing.png".into(),
                ..Attachment::default()
            },
            Attachment {
                id: "a2".into(),
                url: "https://cdn/ok.png".into(),
                filename: "ok.png".into(),
                ..Attachment::default()
            },
        ];

        mirror.handle_message(&message).await.unwrap();

        let sends = relay.sends.lock().unwrap();
        let (_, sent, _, file_count) = &sends[0];
        assert_eq!(*file_count, 1);
        assert_eq!(sent.attachments.len(), 1);
        assert_eq!(sent.attachments[0].id, "a2");
    }

    #[tokio::test]
    async fn mentions_rewrite_to_display_names_and_links() {
        let mut origin = FakeOrigin::default();
        origin.members.insert(
            ("g1".into(), "42".into()),
            Member {
                nick: Some("Bee".into()),
                user: User {
                    id: "42".into(),
                    username: "bee".into(),
                    ..User::default()
                },
            },
        );
        origin.channels.insert(
            "77".into(),
            Channel {
                id: "77".into(),
                name: "random".into(),
            },
        );
        let (mirror, relay, _) = mirror_with(origin, FakeRelay::default());

        mirror
            .handle_message(&user_message("ping <@!42> in <#77> and <@!999>"))
            .await
            .unwrap();

        let sends = relay.sends.lock().unwrap();
        let text = &sends[0].1.text;
        assert!(text.contains("@Bee"));
        assert!(text.contains("<https://origin.example/channels/g1/77|#random>"));
        // unresolved mention stays verbatim
        assert!(text.contains("<@!999>"));
    }

    #[tokio::test]
    async fn channel_name_prefix_applies_when_flagged() {
        let mut origin = FakeOrigin::default();
        origin.channels.insert(
            "c1".into(),
            Channel {
                id: "c1".into(),
                name: "town-square".into(),
            },
        );
        let origin = Arc::new(origin);
        let relay = Arc::new(FakeRelay::default());
        let mirror = MessageMirror::new(
            Arc::clone(&origin) as Arc<dyn OriginApi>,
            Arc::clone(&relay) as Arc<dyn RelayTransport>,
            routed_flags(RouteFlags {
                forward_origin_to_relay: true,
                show_channel_name: true,
                ..RouteFlags::default()
            }),
            identity(),
            BOT_ID,
        );

        mirror.handle_message(&user_message("hello")).await.unwrap();

        let sends = relay.sends.lock().unwrap();
        assert!(sends[0].1.text.starts_with("`#town-square` hello"));
    }

    #[tokio::test]
    async fn failed_send_still_deletes_the_origin_copy() {
        let relay = FakeRelay {
            fail_sends: true,
            ..FakeRelay::default()
        };
        let (mirror, _, origin) = mirror_with(FakeOrigin::default(), relay);

        let outcome = mirror.handle_message(&user_message("hello")).await.unwrap();

        assert_eq!(outcome, MirrorOutcome::Mirrored);
        assert_eq!(
            *origin.deleted.lock().unwrap(),
            vec![("c1".to_string(), "m1".to_string())]
        );
    }
}
