//! Correlation layer - follow-ups to sent messages.
//!
//! - [`Reply`]: acknowledgement correlation and reply actions
//! - [`ReactionListener`]: reactions on a reply, message or file
//! - [`UpdateableReply`]: edits once the real identifier is known

pub mod reaction;
pub mod reply;
pub mod updateable;

pub use reaction::{Reaction, ReactionHandlerFn, ReactionListener, ReactionOrigin};
pub use reply::{AckFailure, Reply};
pub use updateable::{UpdateMode, UpdateableReply};
