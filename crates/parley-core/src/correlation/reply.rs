//! Sent messages and acknowledgement correlation.
//!
//! Sending a message returns a [`Reply`] immediately, holding the local
//! identifier the message was queued under. The provider confirms the
//! message later with an [`AckEvent`] carrying the real identifier; every
//! follow-up action (reacting, deleting, editing, watching reactions) waits
//! for that acknowledgement through a short-lived managed listener.
//!
//! # Guarantees
//!
//! - The success continuation runs at most once, and only for the ack whose
//!   `reply_to` equals the reply's local id.
//! - If no ack arrives within `engine.ack_timeout_secs` (20s by default), or
//!   the provider rejects the message, the failure continuation runs
//!   instead. Never both.
//!
//! Continuations run on the event loop and must not block; spawn any I/O.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::correlation::reaction::{ReactionListener, ReactionOrigin};
use crate::correlation::updateable::UpdateableReply;
use crate::foundation::error::ListenerResult;
use crate::foundation::event::{AckEvent, ChatEvent, LocalId, ReactionItem};
use crate::framework::listener::{Listener, ListenerHandle};
use crate::integration::bot::Bot;

/// Why an acknowledgement never materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckFailure {
    /// No matching ack arrived in time.
    TimedOut,
    /// The provider rejected the message.
    Rejected {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
}

impl fmt::Display for AckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("acknowledgement timed out"),
            Self::Rejected { code, message } => {
                write!(f, "message rejected ({code}): {message}")
            }
        }
    }
}

/// A message the bot sent.
#[derive(Clone)]
pub struct Reply {
    bot: Bot,
    id: LocalId,
    channel: String,
    text: String,
}

impl Reply {
    pub(crate) fn new(bot: Bot, id: LocalId, channel: String, text: String) -> Self {
        Self {
            bot,
            id,
            channel,
            text,
        }
    }

    /// The local identifier the message was queued under.
    pub fn local_id(&self) -> LocalId {
        self.id
    }

    /// The destination channel id.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The text as sent.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bot that sent the message.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Runs `on_ack` once the provider acknowledges the message.
    ///
    /// A missing or rejected acknowledgement is logged.
    pub fn on_ack<F>(&self, on_ack: F) -> ListenerResult<ListenerHandle>
    where
        F: FnOnce(AckEvent) + Send + 'static,
    {
        let id = self.id;
        self.on_ack_or_else(on_ack, move |failure| {
            warn!(local_id = %id, reason = %failure, "No acknowledgement for sent message");
        })
    }

    /// Runs `on_ack` on acknowledgement, or `on_failure` on timeout or
    /// rejection.
    pub fn on_ack_or_else<F, E>(&self, on_ack: F, on_failure: E) -> ListenerResult<ListenerHandle>
    where
        F: FnOnce(AckEvent) + Send + 'static,
        E: FnOnce(AckFailure) + Send + 'static,
    {
        let id = self.id;
        let outcome = Arc::new(AckOutcome {
            on_ack: Mutex::new(Some(Box::new(on_ack))),
            on_failure: Mutex::new(Some(Box::new(on_failure))),
        });
        let timed_out = Arc::clone(&outcome);

        let listener = Listener::new()
            .name(format!("ack:{id}"))
            .duration(self.bot.config().ack_timeout())
            .on_event(move |handle, delivery| {
                match delivery.event() {
                    Some(ChatEvent::Ack(ack)) if ack.reply_to == id => {
                        debug!(local_id = %id, ts = %ack.ts, "Message acknowledged");
                        handle.close();
                        outcome.succeed(ack.clone());
                    }
                    Some(ChatEvent::AckError {
                        reply_to,
                        code,
                        message,
                    }) if *reply_to == id => {
                        handle.close();
                        outcome.fail(AckFailure::Rejected {
                            code: code.clone(),
                            message: message.clone(),
                        });
                    }
                    _ => {}
                }
                futures::future::ready(())
            })
            .on_timeout(move |handle| {
                handle.close();
                timed_out.fail(AckFailure::TimedOut);
            });

        self.bot.register(listener)
    }

    /// Reacts to the message with `emoji` once it is acknowledged.
    pub fn add_reaction(&self, emoji: impl Into<String>) -> ListenerResult<ListenerHandle> {
        let bot = self.bot.clone();
        let channel = self.channel.clone();
        let emoji = emoji.into();
        self.on_ack(move |ack| {
            bot.spawn_add_reaction(emoji, ReactionItem::message(channel, ack.ts));
        })
    }

    /// Deletes the message `delay` after it is acknowledged.
    pub fn delete_after(&self, delay: Duration) -> ListenerResult<ListenerHandle> {
        let api = Arc::clone(self.bot.api());
        let channel = self.channel.clone();
        self.on_ack(move |ack| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = api.delete_message(&channel, &ack.ts).await {
                    warn!(channel = %channel, ts = %ack.ts, error = %e, "Failed to delete message");
                }
            });
        })
    }

    /// Watches reactions on the message once it is acknowledged.
    pub fn listen_reaction(&self, listener: ReactionListener) -> ListenerResult<ListenerHandle> {
        listener.check()?;
        let reply = self.clone();
        self.on_ack(move |ack| {
            let target = ack.ts.clone();
            let origin = ReactionOrigin {
                ack: Some(ack),
                reply: Some(reply.clone()),
                message: None,
            };
            if let Err(e) = reply.bot.register_reaction(target, origin, listener) {
                warn!(local_id = %reply.id, error = %e, "Failed to register reaction listener");
            }
        })
    }

    /// Registers `listener` once the message is acknowledged, scoped to the
    /// acknowledgement (see [`ListenerHandle::reply_ack`]).
    pub fn listen(&self, listener: Listener) -> ListenerResult<ListenerHandle> {
        listener.check()?;
        let bot = self.bot.clone();
        let id = self.id;
        self.on_ack(move |ack| {
            if let Err(e) = bot.register(listener.with_reply_ack(ack)) {
                warn!(local_id = %id, error = %e, "Failed to register reply listener");
            }
        })
    }

    /// Turns the reply into one that can be edited after the fact.
    pub fn updateable(&self) -> ListenerResult<UpdateableReply> {
        UpdateableReply::attach(self.clone())
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("local_id", &self.id)
            .field("channel", &self.channel)
            .field("text", &self.text)
            .finish()
    }
}

// ============================================================================
// Continuations
// ============================================================================

type AckFn = Box<dyn FnOnce(AckEvent) + Send>;
type FailureFn = Box<dyn FnOnce(AckFailure) + Send>;

/// The pair of continuations of one ack wait. Whichever side fires first
/// disarms the other.
struct AckOutcome {
    on_ack: Mutex<Option<AckFn>>,
    on_failure: Mutex<Option<FailureFn>>,
}

impl AckOutcome {
    fn succeed(&self, ack: AckEvent) {
        let on_ack = self.on_ack.lock().take();
        if let Some(on_ack) = on_ack {
            self.on_failure.lock().take();
            on_ack(ack);
        }
    }

    fn fail(&self, failure: AckFailure) {
        let on_failure = self.on_failure.lock().take();
        if let Some(on_failure) = on_failure {
            self.on_ack.lock().take();
            on_failure(failure);
        }
    }
}
