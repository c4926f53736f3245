//! Reaction listeners.
//!
//! A [`ReactionListener`] describes which reactions to wait for. It becomes a
//! regular event listener once its target is known:
//!
//! - on a sent reply, after the acknowledgement supplies the real timestamp
//!   ([`Reply::listen_reaction`](crate::Reply::listen_reaction));
//! - on an incoming message ([`Message::listen_reaction`](crate::Message::listen_reaction));
//! - on any timestamp or file id ([`Bot::listen_reaction`](crate::Bot::listen_reaction)).
//!
//! Reactions on other targets and reactions by the bot itself are dropped
//! before the emoji, user and kind clauses are checked.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::correlation::reply::Reply;
use crate::foundation::error::{ListenerError, ListenerResult};
use crate::foundation::event::{AckEvent, ReactionEvent, ReactionKind};
use crate::foundation::message::Message;
use crate::framework::listener::{Listener, ListenerHandle, TimeoutFn};
use crate::integration::bot::Bot;

/// A type-erased reaction handler.
pub type ReactionHandlerFn =
    Arc<dyn Fn(ListenerHandle, Reaction) -> BoxFuture<'static, ()> + Send + Sync>;

/// What a reaction listener was attached to.
#[derive(Debug, Clone, Default)]
pub struct ReactionOrigin {
    /// The acknowledgement of the reply being watched.
    pub ack: Option<AckEvent>,
    /// The reply being watched.
    pub reply: Option<Reply>,
    /// The incoming message being watched.
    pub message: Option<Arc<Message>>,
}

/// A reaction delivered to a [`ReactionListener`].
#[derive(Debug, Clone)]
pub struct Reaction {
    /// The normalized reaction event.
    pub event: ReactionEvent,
    /// What the listener was attached to.
    pub origin: ReactionOrigin,
}

impl Reaction {
    /// The emoji name.
    pub fn emoji(&self) -> &str {
        &self.event.emoji
    }

    /// The id of the user who reacted.
    pub fn user(&self) -> &str {
        &self.event.user
    }

    /// Added or removed.
    pub fn kind(&self) -> ReactionKind {
        self.event.kind
    }
}

#[derive(Debug, Clone, Default)]
struct ReactionFilter {
    emoji: Option<String>,
    from_user: Option<String>,
    kind: Option<ReactionKind>,
}

impl ReactionFilter {
    fn matches(&self, event: &ReactionEvent) -> bool {
        self.emoji.as_ref().is_none_or(|e| *e == event.emoji)
            && self.from_user.as_ref().is_none_or(|u| *u == event.user)
            && self.kind.is_none_or(|k| k == event.kind)
    }
}

/// Describes the reactions to wait for.
#[derive(Default)]
pub struct ReactionListener {
    filter: ReactionFilter,
    until: Option<Instant>,
    duration: Option<Duration>,
    handler: Option<ReactionHandlerFn>,
    on_timeout: Option<TimeoutFn>,
}

impl ReactionListener {
    /// Creates a listener accepting any reaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only this emoji. Surrounding colons are ignored.
    pub fn emoji(mut self, emoji: impl AsRef<str>) -> Self {
        self.filter.emoji = Some(emoji.as_ref().trim_matches(':').to_string());
        self
    }

    /// Only reactions by `user_id`.
    pub fn from_user(mut self, user_id: impl Into<String>) -> Self {
        self.filter.from_user = Some(user_id.into());
        self
    }

    /// Only additions or only removals.
    pub fn kind(mut self, kind: ReactionKind) -> Self {
        self.filter.kind = Some(kind);
        self
    }

    /// Stops listening at `deadline`.
    pub fn until(mut self, deadline: Instant) -> Self {
        self.until = Some(deadline);
        self
    }

    /// Stops listening `duration` after the listener is registered.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Runs `f` when the deadline elapses.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(ListenerHandle) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(f));
        self
    }

    /// Sets the handler.
    pub fn on_reaction<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ListenerHandle, Reaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |handle, reaction| f(handle, reaction).boxed()));
        self
    }

    /// Validates the configuration.
    pub fn check(&self) -> ListenerResult<()> {
        if self.handler.is_none() {
            return Err(ListenerError::invalid("a reaction handler is required"));
        }
        if self.until.is_some() && self.duration.is_some() {
            return Err(ListenerError::invalid(
                "only one of until and duration may be set",
            ));
        }
        Ok(())
    }

    /// Builds the event listener watching `target`.
    pub(crate) fn into_listener(
        self,
        bot: Bot,
        target: String,
        origin: ReactionOrigin,
    ) -> ListenerResult<Listener> {
        self.check()?;
        let handler = self
            .handler
            .ok_or_else(|| ListenerError::invalid("a reaction handler is required"))?;
        let filter = self.filter;
        let ack = origin.ack.clone();

        let mut listener = Listener::new().name(format!("reaction:{target}"));
        if let Some(deadline) = self.until {
            listener = listener.until(deadline);
        }
        if let Some(duration) = self.duration {
            listener = listener.duration(duration);
        }
        if let Some(on_timeout) = self.on_timeout {
            listener = listener.on_timeout(move |handle| on_timeout(handle));
        }
        if let Some(ack) = ack {
            listener = listener.with_reply_ack(ack);
        }

        Ok(listener.on_event(move |handle, delivery| {
            let matched = delivery
                .reaction()
                .filter(|r| r.item.targets(&target))
                .filter(|r| !bot.myself().is_some_and(|me| me.id == r.user))
                .filter(|r| filter.matches(r))
                .cloned();

            let call = matched.map(|event| {
                handler(
                    handle,
                    Reaction {
                        event,
                        origin: origin.clone(),
                    },
                )
            });

            async move {
                if let Some(call) = call {
                    call.await;
                }
            }
        }))
    }
}

impl fmt::Debug for ReactionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionListener")
            .field("filter", &self.filter)
            .field("until", &self.until)
            .field("duration", &self.duration)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::event::ReactionItem;

    fn reaction(user: &str, emoji: &str, kind: ReactionKind) -> ReactionEvent {
        ReactionEvent {
            kind,
            user: user.into(),
            emoji: emoji.into(),
            item: ReactionItem::message("C1", "1.0"),
            event_ts: "2.0".into(),
        }
    }

    #[test]
    fn test_filter_clauses() {
        let open = ReactionFilter::default();
        assert!(open.matches(&reaction("U1", "+1", ReactionKind::Added)));

        let listener = ReactionListener::new()
            .emoji(":+1:")
            .from_user("U1")
            .kind(ReactionKind::Added);
        let filter = listener.filter;

        assert!(filter.matches(&reaction("U1", "+1", ReactionKind::Added)));
        assert!(!filter.matches(&reaction("U2", "+1", ReactionKind::Added)));
        assert!(!filter.matches(&reaction("U1", "-1", ReactionKind::Added)));
        assert!(!filter.matches(&reaction("U1", "+1", ReactionKind::Removed)));
    }

    #[test]
    fn test_check() {
        assert!(ReactionListener::new().check().is_err());
        assert!(
            ReactionListener::new()
                .on_reaction(|_, _| async {})
                .check()
                .is_ok()
        );
        assert!(
            ReactionListener::new()
                .on_reaction(|_, _| async {})
                .duration(Duration::from_secs(1))
                .until(Instant::now())
                .check()
                .is_err()
        );
    }
}
