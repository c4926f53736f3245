//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use parley_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParleyConfig {
    /// Chat workspace settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Dispatch engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// User ids seeded into the `GlobalAdmins` group.
    #[serde(default)]
    pub global_admins: Vec<String>,

    /// Where to write the process id. Nothing is written when unset.
    #[serde(default)]
    pub pid_path: Option<PathBuf>,

    /// Free-form per-plugin sections, keyed by plugin name.
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,
}

impl ParleyConfig {
    /// Returns the raw section of `plugin`, if configured.
    pub fn plugin_section(&self, plugin: &str) -> Option<&serde_json::Value> {
        self.plugins.get(plugin)
    }
}

/// Chat workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    /// Channels joined on every (re)connect.
    #[serde(default)]
    pub join_channels: Vec<String>,

    /// The workspace's general channel.
    #[serde(default)]
    pub general_channel: String,

    /// Workspace domain.
    #[serde(default)]
    pub team_domain: String,

    /// Workspace id.
    #[serde(default)]
    pub team_id: String,

    /// API token handed to the chat connection.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Base URL under which plugins publish web pages.
    #[serde(default)]
    pub web_base_url: String,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level name as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, for `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    /// Per-module levels, e.g. `parley_core = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}
