//! Provider events as a closed sum type.
//!
//! A chat connection delivers a sequential stream of [`ChatEvent`]s. Only the
//! categories the engine acts upon get their own variant; everything else is
//! carried by [`ChatEvent::Other`] so the dispatch switch never has to mirror
//! the provider's whole API surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{Channel, ChannelKind, SelfInfo, User};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier assigned locally to an outgoing message at send time.
///
/// The provider echoes it back in the acknowledgement (`reply_to`), together
/// with the real message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Subtype of an incoming chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageSubtype {
    /// A regular message from a user.
    #[default]
    Plain,
    /// A message posted by an integration; such senders have no user record.
    BotMessage,
    /// A message was edited; `user` and `text` describe the new version.
    Changed {
        /// Author of the edited message.
        user: String,
        /// New text.
        text: String,
    },
    /// The channel topic was changed by the sender.
    ChannelTopic {
        /// New topic.
        topic: String,
    },
    /// The channel purpose was changed by the sender.
    ChannelPurpose {
        /// New purpose.
        purpose: String,
    },
    /// Any other provider subtype.
    Other {
        /// Provider subtype name.
        name: String,
    },
}

/// A chat message as delivered by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Channel the message was posted in.
    pub channel: String,
    /// Sender user id. Absent for some integration messages.
    #[serde(default)]
    pub user: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Provider timestamp, which doubles as the message identifier.
    pub ts: String,
    /// Message subtype.
    #[serde(default)]
    pub subtype: MessageSubtype,
}

impl MessageEvent {
    /// Creates a plain message.
    pub fn new(
        channel: impl Into<String>,
        user: impl Into<String>,
        text: impl Into<String>,
        ts: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            user: Some(user.into()),
            text: text.into(),
            ts: ts.into(),
            subtype: MessageSubtype::Plain,
        }
    }

    /// Sets the subtype (builder pattern).
    pub fn with_subtype(mut self, subtype: MessageSubtype) -> Self {
        self.subtype = subtype;
        self
    }
}

// ============================================================================
// Directory changes
// ============================================================================

/// An incremental change to the channel directory.
///
/// Channels, private groups and direct conversations share one set of
/// variants; the affected record's [`ChannelKind`] tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryChange {
    /// A channel or group was renamed.
    Renamed {
        /// Channel id.
        id: String,
        /// New name.
        name: String,
    },
    /// The bot joined a channel or group; the full record is attached.
    Joined(Channel),
    /// A channel or group was created.
    Created {
        /// Channel id.
        id: String,
        /// Channel name.
        name: String,
        /// Creator user id.
        creator: String,
        /// Channel or group.
        kind: ChannelKind,
    },
    /// A channel was deleted.
    Deleted {
        /// Channel id.
        id: String,
    },
    /// A channel or group was archived.
    Archived {
        /// Channel id.
        id: String,
    },
    /// A channel or group was unarchived.
    Unarchived {
        /// Channel id.
        id: String,
    },
    /// A direct conversation was created or opened.
    DirectOpened {
        /// Channel id.
        id: String,
        /// Peer user id.
        user: String,
    },
    /// A group or direct conversation was closed.
    Closed {
        /// Channel id.
        id: String,
    },
}

// ============================================================================
// Reactions
// ============================================================================

/// Whether a reaction was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    /// The reaction was added.
    Added,
    /// The reaction was removed.
    Removed,
}

/// The item a reaction is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionItem {
    /// Item type (`message`, `file`, `file_comment`).
    #[serde(default)]
    pub kind: String,
    /// Channel of the target message.
    #[serde(default)]
    pub channel: Option<String>,
    /// Target file id.
    #[serde(default)]
    pub file: Option<String>,
    /// Target file comment id.
    #[serde(default)]
    pub file_comment: Option<String>,
    /// Target message timestamp.
    #[serde(default)]
    pub ts: Option<String>,
}

impl ReactionItem {
    /// A reaction target pointing at a message.
    pub fn message(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            channel: Some(channel.into()),
            ts: Some(ts.into()),
            ..Default::default()
        }
    }

    /// Returns `true` if `item` is the target message timestamp or file id.
    pub fn targets(&self, item: &str) -> bool {
        self.ts.as_deref() == Some(item) || self.file.as_deref() == Some(item)
    }
}

/// A normalized reaction added/removed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Added or removed.
    pub kind: ReactionKind,
    /// User who reacted.
    pub user: String,
    /// Emoji name, without colons.
    pub emoji: String,
    /// What was reacted to.
    pub item: ReactionItem,
    /// Provider event timestamp.
    #[serde(default)]
    pub event_ts: String,
}

// ============================================================================
// Acknowledgements
// ============================================================================

/// The provider's asynchronous confirmation of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEvent {
    /// Local identifier of the outgoing message being acknowledged.
    pub reply_to: LocalId,
    /// Real message identifier (the provider timestamp).
    pub ts: String,
    /// Text as accepted by the provider.
    #[serde(default)]
    pub text: String,
}

// ============================================================================
// ChatEvent
// ============================================================================

/// Every event the chat connection can deliver to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The connection is being (re)established.
    Connecting {
        /// Attempt number for this connection.
        attempt: u32,
        /// Number of connections made so far.
        connection_count: u32,
    },
    /// The connection is up. The engine fetches a fresh directory snapshot.
    Connected {
        /// The bot's own identity.
        myself: SelfInfo,
        /// Number of connections made so far.
        connection_count: u32,
    },
    /// The connection dropped. Reconnection is the connection's business.
    Disconnected {
        /// Reason, if known.
        reason: Option<String>,
    },
    /// A chat message.
    Message(MessageEvent),
    /// A user's presence changed.
    Presence {
        /// User id.
        user: String,
        /// New presence.
        presence: String,
    },
    /// A user's record changed.
    UserChange(User),
    /// The channel directory changed.
    Directory(DirectoryChange),
    /// A reaction was added or removed.
    Reaction(ReactionEvent),
    /// An outgoing message was accepted.
    Ack(AckEvent),
    /// An outgoing message was rejected.
    AckError {
        /// Local identifier of the rejected message.
        reply_to: LocalId,
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
    /// A provider-level error.
    Error {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
    /// Anything the engine does not act upon.
    Other {
        /// Provider event type name.
        kind: String,
    },
}

impl ChatEvent {
    /// Short name of the event category, for logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Connecting { .. } => "connecting",
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Message(_) => "message",
            Self::Presence { .. } => "presence",
            Self::UserChange(_) => "user_change",
            Self::Directory(_) => "directory",
            Self::Reaction(_) => "reaction",
            Self::Ack(_) => "ack",
            Self::AckError { .. } => "ack_error",
            Self::Error { .. } => "error",
            Self::Other { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_item_targets_ts_or_file() {
        let item = ReactionItem::message("C1", "123.456");
        assert!(item.targets("123.456"));
        assert!(!item.targets("F1"));

        let file = ReactionItem {
            kind: "file".into(),
            file: Some("F1".into()),
            ..Default::default()
        };
        assert!(file.targets("F1"));
    }

    #[test]
    fn test_event_deserializes_from_tagged_json() {
        let json = r#"{"event":"ack","reply_to":7,"ts":"1.2","text":"hi"}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ChatEvent::Ack(AckEvent {
                reply_to: LocalId(7),
                ts: "1.2".into(),
                text: "hi".into(),
            })
        );
        assert_eq!(event.name(), "ack");
    }
}
