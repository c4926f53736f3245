//! Framework layer - listener registration and dispatch.
//!
//! - [`Listener`] and [`ListenerHandle`]: subscription and lifecycle
//! - [`Filter`]: clause evaluation
//! - [`EventLoop`]: the single consumer owning the registry
//! - [`EngineConfig`]: engine tuning

pub mod config;
pub mod event_loop;
pub mod filter;
pub mod listener;
pub(crate) mod registry;
pub(crate) mod timer;

pub use config::{EngineConfig, UnknownSenderPolicy};
pub use event_loop::EventLoop;
pub use filter::Filter;
pub use listener::{
    EventHandlerFn, Listener, ListenerHandle, ListenerId, MessageHandlerFn, PredicateFn, TimeoutFn,
};
