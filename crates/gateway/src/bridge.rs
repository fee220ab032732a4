use {
    std::sync::Arc,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use {
    crosstalk_mirror::MessageMirror,
    crosstalk_origin::OriginEvent,
    crosstalk_presence::PresenceTracker,
    crosstalk_reactions::ReactionSync,
    crosstalk_relay::WebhookRegistry,
};

/// Out-of-band commands, delivered outside the origin event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Drop every cached webhook handle (credential rotation).
    ResetWebhooks,
}

/// Wires origin events to their handlers.
///
/// Every inbound event gets its own task; there is no ordering guarantee
/// across events beyond whatever order the origin delivers them in, and no
/// cancellation — handlers run to completion or fail and log.
pub struct Bridge {
    mirror: Arc<MessageMirror>,
    presence: Arc<PresenceTracker>,
    reactions: Arc<ReactionSync>,
    webhooks: Arc<WebhookRegistry>,
}

impl Bridge {
    #[must_use]
    pub fn new(
        mirror: Arc<MessageMirror>,
        presence: Arc<PresenceTracker>,
        reactions: Arc<ReactionSync>,
        webhooks: Arc<WebhookRegistry>,
    ) -> Self {
        Self {
            mirror,
            presence,
            reactions,
            webhooks,
        }
    }

    /// Spawn a handler task for one event and return immediately.
    pub fn dispatch(&self, event: OriginEvent) {
        match event {
            OriginEvent::MessageCreate(message) => {
                let mirror = Arc::clone(&self.mirror);
                tokio::spawn(async move {
                    if let Err(error) = mirror.handle_message(&message).await {
                        warn!(message_id = %message.id, error = %error, "message event abandoned");
                    }
                });
            },
            OriginEvent::VoiceStateUpdate(event) => {
                let presence = Arc::clone(&self.presence);
                tokio::spawn(async move {
                    if let Err(error) = presence.handle_voice_state(&event).await {
                        warn!(user_id = %event.user_id, error = %error, "voice event abandoned");
                    }
                });
            },
            OriginEvent::ReactionAdd(event)
            | OriginEvent::ReactionRemove(event)
            | OriginEvent::ReactionRemoveAll(event) => {
                let reactions = Arc::clone(&self.reactions);
                tokio::spawn(async move {
                    if let Err(error) = reactions.handle_reaction(&event).await {
                        warn!(message_id = %event.message_id, error = %error, "reaction event abandoned");
                    }
                });
            },
        }
    }

    pub fn handle_control(&self, command: ControlCommand) {
        match command {
            ControlCommand::ResetWebhooks => {
                info!("resetting webhook registry");
                self.webhooks.reset();
            },
        }
    }

    /// Drain events and control commands until both channels close.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<OriginEvent>,
        mut control: mpsc::Receiver<ControlCommand>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                // A closed control channel leaves the branch disabled.
                Some(command) = control.recv() => self.handle_control(command),
            }
        }
        debug!("origin event stream closed");
    }
}
