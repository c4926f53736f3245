//! # Parley Core
//!
//! The listener dispatch and acknowledgement correlation engine of the
//! Parley chat bot framework.
//!
//! A chat connection delivers a sequential stream of events. One
//! [`EventLoop`] consumes it: it keeps the [`Directory`] of users and
//! channels current, normalizes chat messages, and hands every event to a
//! dynamic, insertion-ordered set of [`Listener`]s. Listeners are added and
//! removed from any task through the cheap [`Bot`] handle; only the loop
//! mutates the registry.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Directory records**: [`User`], [`Channel`], [`SelfInfo`]
//! - **Provider events**: the [`ChatEvent`] sum type
//! - **Normalized messages**: [`Message`] and [`Delivery`]
//!
//! ### Framework Layer
//!
//! - **Listeners**: [`Listener`], [`ListenerHandle`], [`Filter`]
//! - **Dispatch**: [`EventLoop`], with one deadline heap for managed listeners
//!
//! ### Correlation Layer
//!
//! - **Acknowledgements**: [`Reply::on_ack`], [`Reply::on_ack_or_else`]
//! - **Reactions**: [`ReactionListener`]
//! - **Edits**: [`UpdateableReply`]
//!
//! ### Integration Layer
//!
//! - **Chat service**: the [`ChatApi`] trait, and [`LoopbackApi`] for tests
//! - **Bot handle**: [`Bot`]
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────┐  events  ┌───────────┐  dispatch  ┌───────────┐
//! │   chat   │─────────▶│ EventLoop │───────────▶│ Listeners │
//! │connection│◀────┐    └───────────┘            └─────┬─────┘
//! └──────────┘     │  outgoing queue                   │ reply
//!                  └───────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EngineError> {
//!     let (events_tx, events_rx) = tokio::sync::mpsc::channel(64);
//!     let api = LoopbackApi::new().with_auto_ack(events_tx.clone());
//!     let (bot, event_loop) = Bot::builder(Arc::new(api)).build();
//!
//!     bot.register(
//!         Listener::new()
//!             .matches(r"^!echo (.+)$")
//!             .on_message(|_, msg| async move {
//!                 if let Ok(reply) = msg.reply(msg.matches[1].clone()).await {
//!                     let _ = reply.add_reaction("speech_balloon");
//!                 }
//!             }),
//!     )
//!     .expect("valid listener");
//!
//!     event_loop.run(events_rx).await
//! }
//! ```

// Architectural layers
pub mod correlation;
pub mod foundation;
pub mod framework;
pub mod integration;

pub mod directory;
pub mod groups;
pub mod status;

// Re-export foundation types
pub use foundation::{
    AckEvent, ApiError, ApiResult, Channel, ChannelKind, ChatEvent, Delivery, DirectoryChange,
    DirectorySnapshot, EngineError, GroupError, ListenerError, ListenerResult, LocalId, Message,
    MessageEvent, MessageSubtype, ReactionEvent, ReactionItem, ReactionKind, SelfInfo,
    StatusError, Topic, User,
};

// Re-export framework types
pub use framework::{
    EngineConfig, EventLoop, Filter, Listener, ListenerHandle, ListenerId, UnknownSenderPolicy,
};

// Re-export correlation types
pub use correlation::{
    AckFailure, Reaction, ReactionListener, ReactionOrigin, Reply, UpdateMode, UpdateableReply,
};

// Re-export integration types
pub use integration::{ApiCall, Bot, BotBuilder, BoxedChatApi, ChatApi, LoopbackApi};

pub use directory::Directory;
pub use groups::{GLOBAL_ADMINS, GroupMembership, MemoryGroups};
pub use status::{Component, Health, Status, StatusSnapshot};

/// Prelude for common imports.
pub mod prelude {
    pub use super::correlation::{AckFailure, Reaction, ReactionListener, Reply, UpdateableReply};
    pub use super::foundation::*;
    pub use super::framework::{EngineConfig, EventLoop, Listener, ListenerHandle};
    pub use super::integration::{Bot, ChatApi, LoopbackApi};
    pub use super::groups::{GroupMembership, MemoryGroups};
}
