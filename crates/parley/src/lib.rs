//! # Parley
//!
//! A chat bot framework built around dynamic listeners.
//!
//! ## Overview
//!
//! A chat connection delivers one ordered stream of events. Parley keeps a
//! directory of users and channels current, normalizes messages, and offers
//! every event to a set of listeners that plugins add and remove at any
//! time. Outgoing messages are correlated with the service's
//! acknowledgements, so a reply can be edited, deleted, reacted to, or
//! watched for reactions once it has been delivered.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  events  ┌───────────┐  dispatch  ┌──────────────────────┐
//! │  ChatApi + │─────────▶│ EventLoop │───────────▶│ Listener (plugin A)  │
//! │  event feed│◀──┐      └───────────┘───────────▶│ Listener (plugin B)  │
//! └────────────┘   │                               └──────────┬───────────┘
//!                  └──────────── Bot::send / Reply ───────────┘
//! ```
//!
//! - **Runtime**: loads configuration, sets up logging, initializes plugins
//! - **Plugins**: register listeners during startup through a `PluginContext`
//! - **Listeners**: filters plus message, event and timeout handlers
//! - **Replies**: acknowledgement continuations, edits and reactions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! struct Echo;
//!
//! impl ChatPlugin for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn init(&self, ctx: &PluginContext) -> RuntimeResult<()> {
//!         ctx.bot().register(
//!             Listener::new()
//!                 .matches(r"^!echo (.+)$")
//!                 .on_message(|_, msg| async move {
//!                     let _ = msg.reply(msg.matches[1].clone()).await;
//!                 }),
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = ParleyRuntime::builder().build()?;
//!     runtime.register_chat(Arc::new(Echo));
//!     runtime.run(api, events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `json-log`: JSON log output

pub use parley_core as core;
pub use parley_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use parley_runtime::{ParleyConfig, ParleyRuntime};

    // Plugin system
    pub use parley_runtime::{
        ChatPlugin, Command, HelpProvider, HelpTopic, PluginContext, RuntimeError, RuntimeResult,
    };

    // Listeners and messages
    pub use parley_core::{
        Bot, ChatEvent, Delivery, Filter, Listener, ListenerHandle, Message, ReactionKind,
        ReactionListener, Reply, UpdateableReply,
    };

    // Chat service seam
    pub use parley_core::{BoxedChatApi, ChatApi, LoopbackApi};

    // Logging macros
    pub use parley_runtime::prelude::*;

    pub use std::sync::Arc;
}
