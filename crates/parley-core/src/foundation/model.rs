//! Directory records: users, channels and the bot's own identity.

use serde::{Deserialize, Serialize};

/// A chat service user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider user identifier.
    pub id: String,
    /// Handle / username.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub real_name: String,
    /// Profile email, if exposed by the provider.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether this account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Whether the account has been deactivated.
    #[serde(default)]
    pub deleted: bool,
    /// Last known presence (`active`, `away`, ...).
    #[serde(default)]
    pub presence: Option<String>,
}

impl User {
    /// Creates a user with an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if `query` is this user's id, name, real name or email.
    pub fn matches_query(&self, query: &str) -> bool {
        self.id == query
            || self.name == query
            || (!self.real_name.is_empty() && self.real_name == query)
            || self.email.as_deref() == Some(query)
    }
}

/// The variant of a channel record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A public channel.
    #[default]
    Channel,
    /// A private group.
    Group,
    /// A direct-message conversation with a single user.
    Direct,
}

/// Topic or purpose of a channel, with who set it and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Text of the topic.
    pub value: String,
    /// User id of whoever set it.
    pub creator: String,
    /// Unix timestamp (seconds) of when it was set.
    pub last_set: i64,
}

/// A channel, private group or direct-message conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Provider channel identifier.
    pub id: String,
    /// Channel name without the leading `#`. Empty for direct conversations.
    #[serde(default)]
    pub name: String,
    /// Channel variant.
    #[serde(default)]
    pub kind: ChannelKind,
    /// User id of the creator.
    #[serde(default)]
    pub creator: String,
    /// Peer user id for direct conversations.
    #[serde(default)]
    pub user: Option<String>,
    /// Whether the channel is archived.
    #[serde(default)]
    pub is_archived: bool,
    /// Whether the bot is a member.
    #[serde(default)]
    pub is_member: bool,
    /// Current topic.
    #[serde(default)]
    pub topic: Topic,
    /// Current purpose.
    #[serde(default)]
    pub purpose: Topic,
}

impl Channel {
    /// Creates a public channel record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates a direct-message channel record with `user`.
    pub fn direct(id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Direct,
            user: Some(user.into()),
            ..Default::default()
        }
    }

    /// Returns `true` for direct-message conversations.
    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }
}

/// The bot's own identity, as reported by the provider on connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfInfo {
    /// The bot's user id.
    pub id: String,
    /// The bot's handle.
    pub name: String,
}

/// A full directory fetched from the provider on (re)connect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Every known user.
    pub users: Vec<User>,
    /// Channels, private groups and direct conversations.
    pub channels: Vec<Channel>,
}
