//! Configuration for the Parley runtime.
//!
//! TOML files and `PARLEY_*` environment variables are merged over built-in
//! defaults by [`ConfigLoader`], then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChatConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ParleyConfig, SpanEventConfig,
};
pub use validation::validate_config;
