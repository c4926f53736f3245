//! Integration layer - the chat service boundary.
//!
//! - [`ChatApi`]: outgoing calls into the chat service
//! - [`LoopbackApi`]: a recording in-process implementation
//! - [`Bot`]: the handle plugins and handlers work with

pub mod api;
pub mod bot;
pub mod loopback;

pub use api::{BoxedChatApi, ChatApi};
pub use bot::{Bot, BotBuilder};
pub use loopback::{ApiCall, LoopbackApi};
