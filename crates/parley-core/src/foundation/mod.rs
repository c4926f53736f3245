//! Foundation layer - data model and provider-independent types.
//!
//! - Directory records (users, channels)
//! - Provider events as a closed sum type
//! - The normalized message handed to listeners
//! - Error types

pub mod error;
pub mod event;
pub mod message;
pub mod model;

pub use error::{
    ApiError, ApiResult, EngineError, GroupError, ListenerError, ListenerResult, StatusError,
};
pub use event::{
    AckEvent, ChatEvent, DirectoryChange, LocalId, MessageEvent, MessageSubtype, ReactionEvent,
    ReactionItem, ReactionKind,
};
pub use message::{Delivery, Message};
pub use model::{Channel, ChannelKind, DirectorySnapshot, SelfInfo, Topic, User};
