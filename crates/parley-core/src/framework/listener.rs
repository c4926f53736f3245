//! Listeners: the unit of subscription.
//!
//! A [`Listener`] is built with a builder, then handed to
//! [`Bot::register`](crate::Bot::register), which validates it and returns a
//! [`ListenerHandle`]. The handle is how the listener is closed or has its
//! lifetime reset, from inside its own handler or from any other task.
//!
//! # Lifetimes
//!
//! - No lifetime: the listener lives until closed.
//! - [`Listener::until`]: closes at an absolute deadline.
//! - [`Listener::duration`]: closes a fixed time after registration.
//!
//! Listeners with a lifetime are *managed*: exactly one timer governs their
//! removal, and resetting the lifetime replaces that timer.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use parley_core::Listener;
//!
//! let handle = bot.register(
//!     Listener::new()
//!         .name("confirm")
//!         .from_user(user_id)
//!         .matches(r"^(yes|no)$")
//!         .duration(Duration::from_secs(60))
//!         .on_message(|listener, msg| async move {
//!             let _ = msg.reply(format!("you said {}", msg.matches[1])).await;
//!             listener.close();
//!         })
//!         .on_timeout(|listener| {
//!             tracing::info!(listener = %listener.id(), "nobody answered");
//!         }),
//! )?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::foundation::error::{ListenerError, ListenerResult};
use crate::foundation::event::AckEvent;
use crate::foundation::message::{Delivery, Message};
use crate::framework::filter::Filter;
use crate::framework::registry::{
    AddRequest, ListenerHandler, RegisteredListener, RegistrySender, TimerRequest,
};

/// A type-erased message handler.
pub type MessageHandlerFn =
    Arc<dyn Fn(ListenerHandle, Arc<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A type-erased event handler.
pub type EventHandlerFn = Arc<dyn Fn(ListenerHandle, Delivery) -> BoxFuture<'static, ()> + Send + Sync>;

/// A continuation run when a managed listener's deadline elapses.
pub type TimeoutFn = Arc<dyn Fn(ListenerHandle) + Send + Sync>;

/// A custom filter predicate.
pub type PredicateFn = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

// ============================================================================
// ListenerId
// ============================================================================

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registration. Two registrations never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ============================================================================
// Listener
// ============================================================================

/// A filter and handler pair with an optional lifetime.
#[derive(Default)]
pub struct Listener {
    name: Option<String>,
    description: Option<String>,
    filter: Filter,
    pattern_error: Option<String>,
    message_handler: Option<MessageHandlerFn>,
    event_handler: Option<EventHandlerFn>,
    until: Option<Instant>,
    duration: Option<Duration>,
    on_timeout: Option<TimeoutFn>,
    reply_ack: Option<AckEvent>,
}

impl Listener {
    /// Creates a listener with no filter, no handler and no lifetime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a name, used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a human readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // -------------------------------------------------------------------------
    // Filter clauses
    // -------------------------------------------------------------------------

    /// Requires the text to contain `needle`, ignoring case.
    pub fn contains(mut self, needle: impl Into<String>) -> Self {
        self.filter.contains = Some(needle.into().to_lowercase());
        self
    }

    /// Requires the text to match `pattern`.
    ///
    /// Capture groups end up in [`Message::matches`]. An invalid pattern makes
    /// registration fail.
    pub fn matches(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => {
                self.filter.pattern = Some(regex);
                self.pattern_error = None;
            }
            Err(e) => self.pattern_error = Some(e.to_string()),
        }
        self
    }

    /// Requires the text to match a precompiled regex.
    pub fn regex(mut self, regex: Regex) -> Self {
        self.filter.pattern = Some(regex);
        self.pattern_error = None;
        self
    }

    /// Requires the sender to be `user_id`.
    pub fn from_user(mut self, user_id: impl Into<String>) -> Self {
        self.filter.from_user = Some(user_id.into());
        self
    }

    /// Requires the message to come from channel `channel_id`.
    pub fn from_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.filter.from_channel = Some(channel_id.into());
        self
    }

    /// Requires the sender to be a member of `group`.
    pub fn from_group(mut self, group: impl Into<String>) -> Self {
        self.filter.from_group = Some(group.into());
        self
    }

    /// Requires the message to address the bot.
    pub fn mentions_me(mut self) -> Self {
        self.filter.mentions_me = true;
        self
    }

    /// Adds a custom predicate, evaluated after every other clause.
    pub fn predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.filter.predicate = Some(Arc::new(f));
        self
    }

    // -------------------------------------------------------------------------
    // Lifetime
    // -------------------------------------------------------------------------

    /// Closes the listener at `deadline`.
    pub fn until(mut self, deadline: Instant) -> Self {
        self.until = Some(deadline);
        self
    }

    /// Closes the listener `duration` after registration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Runs `f` when the deadline elapses.
    ///
    /// The listener is closed afterwards unless `f` resets its duration.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(ListenerHandle) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(f));
        self
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    /// Sets the message handler, called for chat messages passing the filter.
    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ListenerHandle, Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.message_handler = Some(Arc::new(move |handle, msg| f(handle, msg).boxed()));
        self
    }

    /// Sets the event handler, called for every event regardless of the
    /// filter.
    pub fn on_event<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ListenerHandle, Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.event_handler = Some(Arc::new(move |handle, delivery| f(handle, delivery).boxed()));
        self
    }

    /// Scopes the listener to an acknowledged reply.
    pub(crate) fn with_reply_ack(mut self, ack: AckEvent) -> Self {
        self.reply_ack = Some(ack);
        self
    }

    /// Returns the configured name.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the configured description.
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns `true` if a deadline is configured.
    pub fn is_managed(&self) -> bool {
        self.until.is_some() || self.duration.is_some()
    }

    /// Validates the configuration without registering.
    pub fn check(&self) -> ListenerResult<()> {
        if let Some(e) = &self.pattern_error {
            return Err(ListenerError::invalid(format!("invalid pattern: {e}")));
        }
        match (&self.message_handler, &self.event_handler) {
            (None, None) => {
                return Err(ListenerError::invalid(
                    "a message handler or an event handler is required",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ListenerError::invalid(
                    "only one of the message handler and the event handler may be set",
                ));
            }
            _ => {}
        }
        if self.until.is_some() && self.duration.is_some() {
            return Err(ListenerError::invalid(
                "only one of until and duration may be set",
            ));
        }
        Ok(())
    }

    /// Validates the listener and turns it into an add request.
    pub(crate) fn into_request(
        self,
        requests: &RegistrySender,
    ) -> ListenerResult<(ListenerHandle, AddRequest)> {
        self.check()?;

        let handler = match (self.message_handler, self.event_handler) {
            (Some(h), None) => ListenerHandler::Message(h),
            (None, Some(h)) => ListenerHandler::Event(h),
            _ => return Err(ListenerError::invalid("exactly one handler is required")),
        };

        let now = Instant::now();
        let duration = match (self.until, self.duration) {
            (Some(deadline), _) => Some(deadline.saturating_duration_since(now)),
            (None, duration) => duration,
        };

        let handle = ListenerHandle::new(
            ListenerId::next(),
            self.name,
            duration,
            self.reply_ack,
            requests.clone(),
        );
        let timer = duration.map(|d| TimerRequest {
            id: handle.id(),
            generation: 0,
            deadline: now + d,
        });

        let listener = RegisteredListener {
            handle: handle.clone(),
            filter: self.filter,
            handler,
            on_timeout: self.on_timeout,
        };

        Ok((
            handle,
            AddRequest {
                listener: Arc::new(listener),
                timer,
            },
        ))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("has_message_handler", &self.message_handler.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .field("until", &self.until)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ListenerHandle
// ============================================================================

struct HandleState {
    id: ListenerId,
    name: Option<String>,
    closed: AtomicBool,
    generation: AtomicU64,
    duration: Mutex<Option<Duration>>,
    reply_ack: Option<AckEvent>,
    requests: RegistrySender,
}

/// A live registration.
///
/// Cloning the handle is cheap; every clone refers to the same registration.
#[derive(Clone)]
pub struct ListenerHandle {
    inner: Arc<HandleState>,
}

impl ListenerHandle {
    fn new(
        id: ListenerId,
        name: Option<String>,
        duration: Option<Duration>,
        reply_ack: Option<AckEvent>,
        requests: RegistrySender,
    ) -> Self {
        Self {
            inner: Arc::new(HandleState {
                id,
                name,
                closed: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                duration: Mutex::new(duration),
                reply_ack,
                requests,
            }),
        }
    }

    /// The registration's identity.
    pub fn id(&self) -> ListenerId {
        self.inner.id
    }

    /// The listener's name, if it was given one.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The acknowledgement this listener is scoped to, if any.
    pub fn reply_ack(&self) -> Option<&AckEvent> {
        self.inner.reply_ack.as_ref()
    }

    /// Returns `true` once the listener has been closed or has timed out.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if a timer governs the listener's removal.
    pub fn is_managed(&self) -> bool {
        self.inner.duration.lock().is_some()
    }

    /// Closes the listener.
    ///
    /// Idempotent and callable from any task. No dispatch starts after this
    /// returns; a handler already running is not interrupted.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(
            listener = %self.inner.id,
            name = self.name().unwrap_or("unnamed"),
            "Closing listener"
        );
        // The loop is gone if this fails, and the registry with it.
        let _ = self.inner.requests.remove.send(self.inner.id);
    }

    /// Restarts the lifetime with the current duration.
    ///
    /// Does nothing for unmanaged or closed listeners.
    pub fn reset_duration(&self) {
        let duration = *self.inner.duration.lock();
        if let Some(duration) = duration {
            self.rearm(duration);
        }
    }

    /// Replaces the duration and restarts the lifetime with it.
    ///
    /// An unmanaged listener becomes managed.
    pub fn reset_new_duration(&self, duration: Duration) {
        *self.inner.duration.lock() = Some(duration);
        self.rearm(duration);
    }

    fn rearm(&self, duration: Duration) {
        if self.is_closed() {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(listener = %self.inner.id, generation, "Re-arming listener timer");
        let _ = self.inner.requests.rearm.send(TimerRequest {
            id: self.inner.id,
            generation,
            deadline: Instant::now() + duration,
        });
    }

    /// The current timer generation. A timer entry is live only while its
    /// generation equals this value.
    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ListenerHandle {}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::registry;

    fn noop() -> Listener {
        Listener::new().on_message(|_, _| async {})
    }

    #[test]
    fn test_check_requires_exactly_one_handler() {
        assert!(Listener::new().check().is_err());
        assert!(noop().check().is_ok());

        let both = noop().on_event(|_, _| async {});
        assert!(matches!(
            both.check(),
            Err(ListenerError::InvalidListenerConfig { .. })
        ));
    }

    #[test]
    fn test_check_rejects_two_lifetimes() {
        let listener = noop()
            .duration(Duration::from_secs(1))
            .until(Instant::now() + Duration::from_secs(5));
        assert!(matches!(
            listener.check(),
            Err(ListenerError::InvalidListenerConfig { .. })
        ));
    }

    #[test]
    fn test_check_rejects_bad_pattern() {
        assert!(noop().matches("(unclosed").check().is_err());
        assert!(noop().matches("(unclosed").matches("(ok)").check().is_ok());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (tx, mut rx) = registry::channel();
        let (handle, _req) = noop().into_request(&tx).unwrap();

        handle.close();
        handle.close();
        assert!(handle.is_closed());

        assert_eq!(rx.remove.recv().await, Some(handle.id()));
        assert!(rx.remove.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_managed_listener_arms_timer_and_rearms_with_new_generation() {
        let (tx, mut rx) = registry::channel();
        let (handle, req) = noop()
            .duration(Duration::from_secs(10))
            .into_request(&tx)
            .unwrap();

        assert!(handle.is_managed());
        let timer = req.timer.unwrap();
        assert_eq!(timer.generation, 0);

        handle.reset_duration();
        let rearm = rx.rearm.recv().await.unwrap();
        assert_eq!(rearm.id, handle.id());
        assert_eq!(rearm.generation, 1);
        assert_eq!(handle.generation(), 1);

        handle.close();
        handle.reset_new_duration(Duration::from_secs(1));
        assert!(rx.rearm.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unmanaged_listener_has_no_timer() {
        let (tx, _rx) = registry::channel();
        let (handle, req) = noop().into_request(&tx).unwrap();
        assert!(!handle.is_managed());
        assert!(req.timer.is_none());
    }
}
