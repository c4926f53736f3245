use std::path::PathBuf;
use thiserror::Error;

/// Why a [`ParleyConfig`](super::ParleyConfig) could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),

    /// A source could not be read, or the merged sources did not fit the schema.
    #[error("cannot read configuration: {0}")]
    Extract(String),

    /// The values were read but break a constraint.
    #[error("bad configuration: {message}")]
    Invalid { message: String },

    /// A `[plugins.<name>]` table did not match what the plugin expects.
    #[error("bad [plugins.{plugin}] section: {reason}")]
    PluginSection { plugin: String, reason: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn plugin_section(plugin: impl Into<String>, reason: impl ToString) -> Self {
        Self::PluginSection {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
