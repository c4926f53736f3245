//! An in-process [`ChatApi`] that records every call.
//!
//! Sends can be acknowledged automatically by feeding an [`AckEvent`] back
//! into the event stream, which makes the full ack round trip observable
//! without a network.
//!
//! # Example
//!
//! ```rust,ignore
//! let (events_tx, events_rx) = tokio::sync::mpsc::channel(64);
//! let api = LoopbackApi::new()
//!     .with_directory(snapshot)
//!     .with_auto_ack(events_tx.clone());
//! let mut calls = api.observe();
//!
//! let (bot, event_loop) = Bot::builder(Arc::new(api.clone())).build();
//! tokio::spawn(event_loop.run(events_rx));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::event::{AckEvent, ChatEvent, LocalId, ReactionItem};
use crate::foundation::model::{Channel, DirectorySnapshot};
use crate::integration::api::ChatApi;

/// A call recorded by [`LoopbackApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    SendMessage {
        id: LocalId,
        channel: String,
        text: String,
    },
    UpdateMessage {
        channel: String,
        ts: String,
        text: String,
    },
    DeleteMessage {
        channel: String,
        ts: String,
    },
    AddReaction {
        emoji: String,
        item: ReactionItem,
    },
    FetchDirectory,
    JoinChannel {
        name: String,
    },
    OpenDirect {
        user: String,
    },
    SetTopic {
        channel: String,
        topic: String,
    },
}

#[derive(Default)]
struct LoopbackState {
    calls: Mutex<Vec<ApiCall>>,
    observers: Mutex<Vec<mpsc::UnboundedSender<ApiCall>>>,
    directory: Mutex<DirectorySnapshot>,
    fetch_error: Mutex<Option<ApiError>>,
    acks: Mutex<Option<mpsc::Sender<ChatEvent>>>,
    next_ts: AtomicU64,
}

/// A recording chat API.
#[derive(Clone, Default)]
pub struct LoopbackApi {
    state: Arc<LoopbackState>,
}

impl LoopbackApi {
    /// Creates an API with an empty directory and no auto-ack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot returned by `fetch_directory`.
    pub fn with_directory(self, snapshot: DirectorySnapshot) -> Self {
        *self.state.directory.lock() = snapshot;
        self
    }

    /// Acknowledges every sent message on `events`.
    pub fn with_auto_ack(self, events: mpsc::Sender<ChatEvent>) -> Self {
        *self.state.acks.lock() = Some(events);
        self
    }

    /// Makes `fetch_directory` fail with `error`.
    pub fn with_fetch_error(self, error: ApiError) -> Self {
        *self.state.fetch_error.lock() = Some(error);
        self
    }

    /// Streams every subsequent call.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<ApiCall> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.observers.lock().push(tx);
        rx
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.calls.lock().clone()
    }

    /// `(channel, text)` of every message sent so far.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.state
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ApiCall::SendMessage { channel, text, .. } => {
                    Some((channel.clone(), text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        debug!(call = ?call, "Loopback API call");
        self.state
            .observers
            .lock()
            .retain(|observer| observer.send(call.clone()).is_ok());
        self.state.calls.lock().push(call);
    }

    fn next_ts(&self) -> String {
        let n = self.state.next_ts.fetch_add(1, Ordering::Relaxed) + 1;
        format!("1700000000.{n:06}")
    }
}

#[async_trait]
impl ChatApi for LoopbackApi {
    async fn send_message(&self, id: LocalId, channel: &str, text: &str) -> ApiResult<()> {
        self.record(ApiCall::SendMessage {
            id,
            channel: channel.to_string(),
            text: text.to_string(),
        });

        let acks = self.state.acks.lock().clone();
        if let Some(acks) = acks {
            let ack = ChatEvent::Ack(AckEvent {
                reply_to: id,
                ts: self.next_ts(),
                text: text.to_string(),
            });
            acks.send(ack).await.map_err(|_| ApiError::NotConnected)?;
        }
        Ok(())
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> ApiResult<()> {
        self.record(ApiCall::UpdateMessage {
            channel: channel.to_string(),
            ts: ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> ApiResult<()> {
        self.record(ApiCall::DeleteMessage {
            channel: channel.to_string(),
            ts: ts.to_string(),
        });
        Ok(())
    }

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> ApiResult<()> {
        self.record(ApiCall::AddReaction {
            emoji: emoji.to_string(),
            item: item.clone(),
        });
        Ok(())
    }

    async fn fetch_directory(&self) -> ApiResult<DirectorySnapshot> {
        self.record(ApiCall::FetchDirectory);
        if let Some(error) = self.state.fetch_error.lock().clone() {
            return Err(error);
        }
        Ok(self.state.directory.lock().clone())
    }

    async fn join_channel(&self, name: &str) -> ApiResult<Channel> {
        self.record(ApiCall::JoinChannel {
            name: name.to_string(),
        });
        let name = name.trim_start_matches('#');
        let known = self
            .state
            .directory
            .lock()
            .channels
            .iter()
            .find(|c| c.name == name)
            .cloned();
        let mut channel = known.unwrap_or_else(|| Channel::new(format!("C{name}"), name));
        channel.is_member = true;
        Ok(channel)
    }

    async fn open_direct(&self, user_id: &str) -> ApiResult<Channel> {
        self.record(ApiCall::OpenDirect {
            user: user_id.to_string(),
        });
        Ok(Channel::direct(format!("D{user_id}"), user_id))
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> ApiResult<()> {
        self.record(ApiCall::SetTopic {
            channel: channel.to_string(),
            topic: topic.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_ack_echoes_local_id() {
        let (tx, mut rx) = mpsc::channel(4);
        let api = LoopbackApi::new().with_auto_ack(tx);

        api.send_message(LocalId(42), "C1", "hello").await.unwrap();

        match rx.recv().await {
            Some(ChatEvent::Ack(ack)) => {
                assert_eq!(ack.reply_to, LocalId(42));
                assert_eq!(ack.text, "hello");
                assert!(!ack.ts.is_empty());
            }
            other => panic!("expected an ack, got {other:?}"),
        }
        assert_eq!(api.sent_messages(), vec![("C1".into(), "hello".into())]);
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let api = LoopbackApi::new().with_fetch_error(ApiError::Transport("down".into()));
        assert!(matches!(
            api.fetch_directory().await,
            Err(ApiError::Transport(_))
        ));
        assert_eq!(api.calls(), vec![ApiCall::FetchDirectory]);
    }

    #[test]
    fn test_open_direct_and_topic_are_recorded() {
        let api = LoopbackApi::new();
        let channel = tokio_test::block_on(api.open_direct("U2")).unwrap();
        assert_eq!(channel.id, "DU2");
        tokio_test::assert_ok!(tokio_test::block_on(api.set_topic("C1", "standup")));

        assert_eq!(
            api.calls(),
            vec![
                ApiCall::OpenDirect { user: "U2".into() },
                ApiCall::SetTopic {
                    channel: "C1".into(),
                    topic: "standup".into(),
                },
            ]
        );
    }
}
