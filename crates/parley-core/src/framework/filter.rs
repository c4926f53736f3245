//! Listener filter evaluation.
//!
//! A filter is a conjunction of optional clauses. Clauses are evaluated in a
//! fixed order and the first failing clause short-circuits:
//!
//! 1. substring containment (case-insensitive)
//! 2. regular expression; captures are kept for the handler
//! 3. sender id
//! 4. source channel id
//! 5. bot addressed
//! 6. sender group membership
//! 7. custom predicate
//!
//! A filter with no clauses passes every message.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::foundation::message::Message;
use crate::framework::listener::PredicateFn;
use crate::groups::GroupMembership;

/// The filter clauses of a listener.
#[derive(Clone, Default)]
pub struct Filter {
    pub(crate) contains: Option<String>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) from_user: Option<String>,
    pub(crate) from_channel: Option<String>,
    pub(crate) from_group: Option<String>,
    pub(crate) mentions_me: bool,
    pub(crate) predicate: Option<PredicateFn>,
}

impl Filter {
    /// Returns `true` if no clause is configured.
    pub fn is_open(&self) -> bool {
        self.contains.is_none()
            && self.pattern.is_none()
            && self.from_user.is_none()
            && self.from_channel.is_none()
            && self.from_group.is_none()
            && !self.mentions_me
            && self.predicate.is_none()
    }

    /// Evaluates the filter against `msg`.
    ///
    /// Returns the message to hand to the listener: `msg` itself, or a copy
    /// carrying the pattern's capture groups. `None` means the filter failed.
    pub fn apply(&self, msg: &Arc<Message>, groups: &dyn GroupMembership) -> Option<Arc<Message>> {
        if let Some(needle) = &self.contains {
            if !msg.text.to_lowercase().contains(needle.as_str()) {
                return None;
            }
        }

        let mut delivered = Arc::clone(msg);
        if let Some(pattern) = &self.pattern {
            let captures = pattern.captures(&msg.text)?;
            let matches = captures
                .iter()
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect();
            delivered = Arc::new(msg.with_matches(matches));
        }

        if let Some(user) = &self.from_user {
            if msg.user_id() != Some(user.as_str()) {
                return None;
            }
        }

        if let Some(channel) = &self.from_channel {
            if msg.channel_id() != channel {
                return None;
            }
        }

        if self.mentions_me && !msg.mentions_me {
            return None;
        }

        if let Some(group) = &self.from_group {
            let user = msg.from_user.as_ref()?;
            match groups.is_member(group, &user.id) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    warn!(group = %group, user = %user.id, error = %e, "Group lookup failed");
                    return None;
                }
            }
        }

        if let Some(predicate) = &self.predicate {
            if !predicate(delivered.as_ref()) {
                return None;
            }
        }

        Some(delivered)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("contains", &self.contains)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("from_user", &self.from_user)
            .field("from_channel", &self.from_channel)
            .field("from_group", &self.from_group)
            .field("mentions_me", &self.mentions_me)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}
