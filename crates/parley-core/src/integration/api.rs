//! The chat service as seen by the engine.
//!
//! The wire protocol lives outside this crate. A connection implementation
//! provides two things: a stream of [`ChatEvent`](crate::ChatEvent)s fed to
//! [`EventLoop::run`](crate::EventLoop::run), and an implementation of
//! [`ChatApi`] for outgoing calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::ApiResult;
use crate::foundation::event::{LocalId, ReactionItem};
use crate::foundation::model::{Channel, DirectorySnapshot};

/// Outgoing calls into the chat service.
///
/// # API Design
///
/// - `send_message` only transmits. The provider acknowledges the message
///   later with an [`AckEvent`](crate::AckEvent) whose `reply_to` is `id`.
/// - Every other call completes when the provider answers.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Transmits a text message to `channel` under the local identifier `id`.
    async fn send_message(&self, id: LocalId, channel: &str, text: &str) -> ApiResult<()>;

    /// Replaces the text of the message `ts` in `channel`.
    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> ApiResult<()>;

    /// Deletes the message `ts` in `channel`.
    async fn delete_message(&self, channel: &str, ts: &str) -> ApiResult<()>;

    /// Adds the reaction `emoji` to `item`.
    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> ApiResult<()>;

    /// Fetches users, channels, groups and direct conversations.
    async fn fetch_directory(&self) -> ApiResult<DirectorySnapshot>;

    /// Joins the channel called `name`, returning its record.
    async fn join_channel(&self, name: &str) -> ApiResult<Channel>;

    /// Opens (or returns) the direct conversation with `user_id`.
    async fn open_direct(&self, user_id: &str) -> ApiResult<Channel>;

    /// Sets the topic of `channel`.
    async fn set_topic(&self, channel: &str, topic: &str) -> ApiResult<()>;
}

/// A shared chat API handle.
pub type BoxedChatApi = Arc<dyn ChatApi>;
