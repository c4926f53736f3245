//! Runtime error types.

use parley_core::{EngineError, ListenerError};
use thiserror::Error;

pub use crate::config::error::{ConfigError, ConfigResult};

/// Errors that can occur while running a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The event loop stopped with an error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// A plugin registered an invalid listener.
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    /// A plugin failed to initialize.
    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// PID file or signal handling failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Creates a plugin error.
    pub fn plugin(plugin: impl Into<String>, message: impl ToString) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
