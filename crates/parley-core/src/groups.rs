//! Group membership lookup.
//!
//! Listener filters can require the sender to belong to a named group. The
//! engine only needs the [`GroupMembership`] lookup; where groups are stored
//! is up to the application. [`MemoryGroups`] is an in-process store that can
//! be seeded from JSON.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::foundation::error::GroupError;

/// Name of the group holding the bot's global administrators.
pub const GLOBAL_ADMINS: &str = "GlobalAdmins";

/// External group membership lookup used by listener filters.
pub trait GroupMembership: Send + Sync {
    /// Returns whether `user_id` is a member of `group`.
    ///
    /// Unknown groups have no members.
    fn is_member(&self, group: &str, user_id: &str) -> Result<bool, GroupError>;
}

/// An in-memory group store.
#[derive(Debug, Default)]
pub struct MemoryGroups {
    groups: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryGroups {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose [`GLOBAL_ADMINS`] group holds `admins`.
    pub fn with_global_admins<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for admin in admins {
            store.add_member(GLOBAL_ADMINS, admin);
        }
        store
    }

    /// Loads groups from a JSON object of `group -> [user ids]`.
    ///
    /// Malformed data is treated as "no groups yet": a warning is logged and
    /// an empty store is returned.
    pub fn load_json(json: &str) -> Self {
        match serde_json::from_str::<HashMap<String, Vec<String>>>(json) {
            Ok(groups) => Self {
                groups: RwLock::new(groups),
            },
            Err(e) => {
                warn!(error = %e, "Malformed group data, starting with no groups");
                Self::new()
            }
        }
    }

    /// Serializes every group to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.groups.read())
    }

    /// Adds a member. Adding an existing member is a no-op.
    pub fn add_member(&self, group: &str, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut groups = self.groups.write();
        let members = groups.entry(group.to_string()).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Removes a member. Returns whether it was present.
    pub fn remove_member(&self, group: &str, user_id: &str) -> bool {
        let mut groups = self.groups.write();
        let Some(members) = groups.get_mut(group) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m != user_id);
        before != members.len()
    }

    /// Returns the members of `group`, empty if it does not exist.
    pub fn members(&self, group: &str) -> Vec<String> {
        self.groups.read().get(group).cloned().unwrap_or_default()
    }
}

impl GroupMembership for MemoryGroups {
    fn is_member(&self, group: &str, user_id: &str) -> Result<bool, GroupError> {
        Ok(self
            .groups
            .read()
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == user_id)))
    }
}
