//! Parley Runtime - Orchestration layer for the Parley chat bot framework.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `ParleyConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - The plugin model (`ChatPlugin`, `HelpProvider`, `PluginRegistry`)
//! - Shared plugin state (`StringRegistry`, `MoodState`)
//! - Runtime orchestration (`ParleyRuntime`), including the built-in `!help`
//!
//! The chat connection itself is not part of this crate: the caller hands
//! [`ParleyRuntime::run`] a [`ChatApi`](parley_core::ChatApi) and the
//! receiving end of its event stream.
//!
//! ```ignore
//! use parley_runtime::ParleyRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = ParleyRuntime::builder().build()?;
//!     runtime.register_chat(Arc::new(MyPlugin));
//!
//!     let (api, events) = connect().await?;
//!     runtime.run(api, events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod help;
pub mod logging;
pub mod mood;
pub mod plugin;
pub mod runtime;
pub mod strings;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use help::HelpPlugin;
pub use logging::{LoggingBuilder, SpanEvents};
pub use mood::{Mood, MoodState};
pub use plugin::{ChatPlugin, Command, HelpProvider, HelpTopic, PluginContext, PluginRegistry};
pub use runtime::{ParleyRuntime, RuntimeBuilder};
pub use strings::StringRegistry;

// Re-export tracing for use by plugin crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
