//! Replies that can be edited after they were sent.
//!
//! Edits need the message's real identifier, which only the acknowledgement
//! provides. Until it arrives, an edit is kept pending; a newer edit replaces
//! the pending one outright. Every edit is computed from the reply's
//! original text:
//!
//! | mode    | new text            |
//! |---------|---------------------|
//! | replace | `text`              |
//! | prefix  | `text` + original   |
//! | suffix  | original + `text`   |

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::correlation::reply::Reply;
use crate::foundation::error::ListenerResult;

/// Where an edit puts its text relative to the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// The edit replaces the whole text.
    Replace,
    /// The edit goes before the original text.
    Prefix,
    /// The edit goes after the original text.
    Suffix,
}

impl UpdateMode {
    /// Computes the edited text.
    pub fn apply(self, original: &str, text: &str) -> String {
        match self {
            Self::Replace => text.to_string(),
            Self::Prefix => format!("{text}{original}"),
            Self::Suffix => format!("{original}{text}"),
        }
    }
}

#[derive(Default)]
struct EditState {
    ts: Option<String>,
    pending: Option<(UpdateMode, String)>,
    seq: u64,
}

struct UpdateableInner {
    reply: Reply,
    state: Mutex<EditState>,
    sent_seq: AtomicU64,
    send_lock: tokio::sync::Mutex<()>,
}

/// A reply that can be edited once its real identifier is known.
#[derive(Clone)]
pub struct UpdateableReply {
    inner: Arc<UpdateableInner>,
}

impl UpdateableReply {
    pub(crate) fn attach(reply: Reply) -> ListenerResult<Self> {
        let updateable = Self {
            inner: Arc::new(UpdateableInner {
                reply: reply.clone(),
                state: Mutex::new(EditState::default()),
                sent_seq: AtomicU64::new(0),
                send_lock: tokio::sync::Mutex::new(()),
            }),
        };

        let on_ack = updateable.clone();
        reply.on_ack(move |ack| {
            on_ack.inner.state.lock().ts = Some(ack.ts);
            on_ack.dispatch();
        })?;

        Ok(updateable)
    }

    /// The underlying reply.
    pub fn reply(&self) -> &Reply {
        &self.inner.reply
    }

    /// The real identifier, once acknowledged.
    pub fn ts(&self) -> Option<String> {
        self.inner.state.lock().ts.clone()
    }

    /// Replaces the whole text.
    pub fn update(&self, text: impl Into<String>) {
        self.update_with_mode(UpdateMode::Replace, text);
    }

    /// Puts `text` before the original text.
    pub fn update_prefix(&self, text: impl Into<String>) {
        self.update_with_mode(UpdateMode::Prefix, text);
    }

    /// Puts `text` after the original text.
    pub fn update_suffix(&self, text: impl Into<String>) {
        self.update_with_mode(UpdateMode::Suffix, text);
    }

    /// Records an edit and sends it if the identifier is known.
    pub fn update_with_mode(&self, mode: UpdateMode, text: impl Into<String>) {
        self.inner.state.lock().pending = Some((mode, text.into()));
        self.dispatch();
    }

    fn dispatch(&self) {
        let (ts, text, seq) = {
            let mut state = self.inner.state.lock();
            let Some(ts) = state.ts.clone() else {
                trace!(local_id = %self.inner.reply.local_id(), "Edit pending until ack");
                return;
            };
            let Some((mode, text)) = state.pending.take() else {
                return;
            };
            state.seq += 1;
            (ts, mode.apply(self.inner.reply.text(), &text), state.seq)
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _guard = inner.send_lock.lock().await;
            // A newer edit already went out.
            if inner.sent_seq.load(Ordering::Acquire) >= seq {
                return;
            }
            let channel = inner.reply.channel();
            if let Err(e) = inner
                .reply
                .bot()
                .api()
                .update_message(channel, &ts, &text)
                .await
            {
                warn!(channel = %channel, ts = %ts, error = %e, "Failed to update message");
            }
            inner.sent_seq.store(seq, Ordering::Release);
        });
    }
}

impl std::fmt::Debug for UpdateableReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateableReply")
            .field("reply", &self.inner.reply)
            .field("ts", &self.ts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_modes_use_original_text() {
        assert_eq!(UpdateMode::Replace.apply("working", "done"), "done");
        assert_eq!(UpdateMode::Prefix.apply("working", ":+1: "), ":+1: working");
        assert_eq!(UpdateMode::Suffix.apply("working", "... done"), "working... done");
    }
}
