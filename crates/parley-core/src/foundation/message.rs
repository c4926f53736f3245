//! The normalized message handed to listeners.
//!
//! The event loop turns every provider [`MessageEvent`] into a [`Message`]:
//! edits are unwrapped, the sender and source channel are resolved against
//! the directory, and addressing flags are computed. Sender and channel are
//! always optional; a directory miss never aborts dispatch.
//!
//! # Example
//!
//! ```rust,ignore
//! bot.register(
//!     Listener::new()
//!         .contains("ping")
//!         .on_message(|_listener, msg| async move {
//!             if let Ok(reply) = msg.reply_mention("pong").await {
//!                 let _ = reply.add_reaction("table_tennis_paddle_and_ball");
//!             }
//!         }),
//! )?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::error::{ApiResult, ListenerResult};
use super::event::{AckEvent, ChatEvent, MessageEvent, MessageSubtype, ReactionEvent, ReactionItem};
use super::model::{Channel, User};
use crate::correlation::reaction::{ReactionListener, ReactionOrigin};
use crate::correlation::reply::Reply;
use crate::directory::Directory;
use crate::framework::listener::ListenerHandle;
use crate::integration::bot::Bot;

/// A chat message in the engine's common shape.
#[derive(Clone)]
pub struct Message {
    /// The provider event, after edit unwrapping.
    pub event: MessageEvent,
    /// Message text.
    pub text: String,
    /// Resolved sender, if the directory knows it.
    pub from_user: Option<User>,
    /// Resolved source channel, if the directory knows it.
    pub from_channel: Option<Channel>,
    /// Whether the bot was addressed (direct channel, `<@id>` mention, or
    /// text starting with the bot's name).
    pub mentions_me: bool,
    /// Whether the bot itself authored the message.
    pub from_me: bool,
    /// Whether this is an edit of an earlier message.
    pub is_edit: bool,
    /// Capture groups of the listener's pattern; group 0 is the full match.
    pub matches: Vec<String>,
    bot: Bot,
}

impl Message {
    /// Builds the normalized message for a provider event.
    pub(crate) fn normalize(raw: &MessageEvent, directory: &Directory, bot: Bot) -> Self {
        let mut event = raw.clone();
        let mut is_edit = false;

        if let MessageSubtype::Changed { user, text } = &raw.subtype {
            event.user = Some(user.clone());
            event.text.clone_from(text);
            is_edit = true;
        }

        let from_channel = directory.channel(&event.channel);
        if from_channel.is_none() {
            warn!(
                channel = %event.channel,
                "BrokenChannelMap: message from a channel missing from the directory"
            );
        }

        let from_user = event.user.as_deref().and_then(|id| directory.user(id));
        if from_user.is_none() && event.subtype != MessageSubtype::BotMessage {
            warn!(
                user = event.user.as_deref().unwrap_or("<none>"),
                channel = %event.channel,
                "BrokenUserMap: message from a user missing from the directory"
            );
        }

        let myself = directory.myself();
        let from_me = match (&myself, &event.user) {
            (Some(me), Some(user)) => me.id == *user,
            _ => false,
        };

        let mentions_me = from_channel.as_ref().is_some_and(Channel::is_direct)
            || myself.as_ref().is_some_and(|me| {
                event.text.contains(&format!("<@{}>", me.id))
                    || (!me.name.is_empty()
                        && event
                            .text
                            .to_lowercase()
                            .starts_with(&me.name.to_lowercase()))
            });

        Self {
            text: event.text.clone(),
            event,
            from_user,
            from_channel,
            mentions_me,
            from_me,
            is_edit,
            matches: Vec::new(),
            bot,
        }
    }

    /// The bot this message was delivered to.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The provider timestamp identifying the message.
    pub fn ts(&self) -> &str {
        &self.event.ts
    }

    /// The id of the channel the message was posted in.
    pub fn channel_id(&self) -> &str {
        &self.event.channel
    }

    /// The sender's id, if the provider supplied one.
    pub fn user_id(&self) -> Option<&str> {
        self.event.user.as_deref()
    }

    /// The sender's handle, or an empty string when unresolved.
    pub fn username(&self) -> &str {
        self.from_user.as_ref().map_or("", |u| u.name.as_str())
    }

    /// Returns `true` for messages in a direct conversation.
    pub fn is_private(&self) -> bool {
        self.from_channel.as_ref().is_some_and(Channel::is_direct)
    }

    /// Case-insensitive substring test against the message text.
    pub fn contains(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Returns `true` if the text starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    /// Capture group `index` of the listener's pattern, if present.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.matches.get(index).map(String::as_str)
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Replies in the channel the message came from.
    pub async fn reply(&self, text: impl Into<String>) -> ApiResult<Reply> {
        self.bot.send(&self.event.channel, text).await
    }

    /// Replies in the same channel, mentioning the sender unless the
    /// conversation is already private.
    pub async fn reply_mention(&self, text: impl Into<String>) -> ApiResult<Reply> {
        let text = text.into();
        match self.user_id() {
            Some(user) if !self.is_private() => self.reply(format!("<@{user}> {text}")).await,
            _ => self.reply(text).await,
        }
    }

    /// Replies to the sender in a direct conversation, falling back to the
    /// source channel when the sender is unknown. Runs in the background; see
    /// [`Bot::send_private`] for when `then` is called.
    pub fn reply_privately<F>(&self, text: impl Into<String>, then: F)
    where
        F: FnOnce(ApiResult<Reply>) + Send + 'static,
    {
        match self.user_id() {
            Some(user) => self.bot.send_private(user, text, then),
            None => {
                let bot = self.bot.clone();
                let channel = self.event.channel.clone();
                let text = text.into();
                tokio::spawn(async move { bot.send_then(&channel, text, then).await });
            }
        }
    }

    /// Reacts to the message with `emoji`. The API call runs in the background.
    pub fn add_reaction(&self, emoji: impl Into<String>) {
        self.bot.spawn_add_reaction(
            emoji.into(),
            ReactionItem::message(self.event.channel.clone(), self.event.ts.clone()),
        );
    }

    /// Listens for reactions on this message.
    pub fn listen_reaction(self: &Arc<Self>, listener: ReactionListener) -> ListenerResult<ListenerHandle> {
        let origin = ReactionOrigin {
            message: Some(Arc::clone(self)),
            ..Default::default()
        };
        self.bot.register_reaction(self.event.ts.clone(), origin, listener)
    }

    pub(crate) fn with_matches(&self, matches: Vec<String>) -> Self {
        let mut msg = self.clone();
        msg.matches = matches;
        msg
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("channel", &self.event.channel)
            .field("user", &self.event.user)
            .field("ts", &self.event.ts)
            .field("text", &self.text)
            .field("mentions_me", &self.mentions_me)
            .field("from_me", &self.from_me)
            .field("is_edit", &self.is_edit)
            .field("matches", &self.matches)
            .finish()
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// What an event handler receives: the normalized message when the event was
/// a chat message, the raw event otherwise.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// A normalized chat message.
    Message(Arc<Message>),
    /// Any other event.
    Event(Arc<ChatEvent>),
}

impl Delivery {
    /// Returns the message, if this delivery carries one.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::Event(_) => None,
        }
    }

    /// Returns the raw event, if this delivery is not a message.
    pub fn event(&self) -> Option<&ChatEvent> {
        match self {
            Self::Message(_) => None,
            Self::Event(event) => Some(event),
        }
    }

    /// Returns the acknowledgement carried by this delivery.
    pub fn ack(&self) -> Option<&AckEvent> {
        match self.event() {
            Some(ChatEvent::Ack(ack)) => Some(ack),
            _ => None,
        }
    }

    /// Returns the reaction carried by this delivery.
    pub fn reaction(&self) -> Option<&ReactionEvent> {
        match self.event() {
            Some(ChatEvent::Reaction(reaction)) => Some(reaction),
            _ => None,
        }
    }
}
