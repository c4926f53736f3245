//! Directory cache: the in-memory mirror of known users and channels.
//!
//! The cache is fully replaced on every (re)connect and patched incrementally
//! by the event loop as directory-changing events arrive. Other tasks read it
//! through accessor calls; every read and write takes the matching lock, and
//! accessors hand out clones so no lock is ever held across an `.await`.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::foundation::event::DirectoryChange;
use crate::foundation::model::{Channel, DirectorySnapshot, SelfInfo, User};

/// Lock-guarded user and channel directories.
#[derive(Debug, Default)]
pub struct Directory {
    users: RwLock<HashMap<String, User>>,
    channels: RwLock<HashMap<String, Channel>>,
    myself: RwLock<Option<SelfInfo>>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces both maps with a fresh snapshot.
    pub fn replace(&self, snapshot: DirectorySnapshot) {
        debug!(
            users = snapshot.users.len(),
            channels = snapshot.channels.len(),
            "Replacing directory snapshot"
        );

        let users = snapshot
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let channels = snapshot
            .channels
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        // Users before channels, here and in `snapshot`.
        let mut users_guard = self.users.write();
        let mut channels_guard = self.channels.write();
        *users_guard = users;
        *channels_guard = channels;
    }

    /// A consistent copy of both maps.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let users = self.users.read();
        let channels = self.channels.read();
        DirectorySnapshot {
            users: users.values().cloned().collect(),
            channels: channels.values().cloned().collect(),
        }
    }

    // =========================================================================
    // Self identity
    // =========================================================================

    /// Records the bot's own identity.
    pub fn set_myself(&self, myself: SelfInfo) {
        *self.myself.write() = Some(myself);
    }

    /// Returns the bot's own identity, once connected.
    pub fn myself(&self) -> Option<SelfInfo> {
        self.myself.read().clone()
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Looks up a user by id.
    pub fn user(&self, id: &str) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    /// Finds a user by id, name, real name or email.
    pub fn find_user(&self, query: &str) -> Option<User> {
        let users = self.users.read();
        if let Some(user) = users.get(query) {
            return Some(user.clone());
        }
        users.values().find(|u| u.matches_query(query)).cloned()
    }

    /// Inserts or replaces a user record.
    pub fn upsert_user(&self, user: User) {
        self.users.write().insert(user.id.clone(), user);
    }

    /// Records a presence change. Returns `false` if the user is unknown.
    pub fn set_presence(&self, id: &str, presence: &str) -> bool {
        match self.users.write().get_mut(id) {
            Some(user) => {
                user.presence = Some(presence.to_string());
                true
            }
            None => false,
        }
    }

    /// Number of cached users.
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Looks up a channel by id.
    pub fn channel(&self, id: &str) -> Option<Channel> {
        self.channels.read().get(id).cloned()
    }

    /// Looks up a channel by name; a leading `#` is ignored.
    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        let name = name.trim_start_matches('#');
        self.channels
            .read()
            .values()
            .find(|c| !c.is_direct() && c.name == name)
            .cloned()
    }

    /// Returns the direct conversation with `user_id`, if one is cached.
    pub fn direct_channel_with(&self, user_id: &str) -> Option<Channel> {
        self.channels
            .read()
            .values()
            .find(|c| c.is_direct() && c.user.as_deref() == Some(user_id))
            .cloned()
    }

    /// Inserts or replaces a channel record.
    pub fn update_channel(&self, channel: Channel) {
        self.channels.write().insert(channel.id.clone(), channel);
    }

    /// Removes a channel record.
    pub fn delete_channel(&self, id: &str) -> Option<Channel> {
        self.channels.write().remove(id)
    }

    /// Mutates a cached channel in place. Returns `false` if it is unknown.
    pub fn patch_channel(&self, id: &str, f: impl FnOnce(&mut Channel)) -> bool {
        match self.channels.write().get_mut(id) {
            Some(channel) => {
                f(channel);
                true
            }
            None => false,
        }
    }

    /// Returns every cached channel.
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.read().values().cloned().collect()
    }

    /// Number of cached channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Applies an incremental directory change.
    ///
    /// Returns `false` when the change refers to a channel the cache does not
    /// know about; the change is dropped in that case.
    pub fn apply(&self, change: &DirectoryChange) -> bool {
        match change {
            DirectoryChange::Renamed { id, name } => {
                self.patch_channel(id, |c| c.name.clone_from(name))
            }
            DirectoryChange::Joined(channel) => {
                let mut channel = channel.clone();
                channel.is_member = true;
                self.update_channel(channel);
                true
            }
            DirectoryChange::Created {
                id,
                name,
                creator,
                kind,
            } => {
                self.update_channel(Channel {
                    id: id.clone(),
                    name: name.clone(),
                    creator: creator.clone(),
                    kind: *kind,
                    ..Default::default()
                });
                true
            }
            DirectoryChange::Deleted { id } | DirectoryChange::Closed { id } => {
                self.delete_channel(id).is_some()
            }
            DirectoryChange::Archived { id } => self.patch_channel(id, |c| c.is_archived = true),
            DirectoryChange::Unarchived { id } => {
                self.patch_channel(id, |c| c.is_archived = false)
            }
            DirectoryChange::DirectOpened { id, user } => {
                self.update_channel(Channel::direct(id.clone(), user.clone()));
                true
            }
        }
    }
}
