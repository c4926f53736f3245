//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ChatConfig, LogOutput, ParleyConfig};
use parley_core::EngineConfig;

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_engine_config(&config.engine)?;
    validate_chat_config(&config.chat)?;

    if config.global_admins.iter().any(|id| id.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "global_admins cannot contain empty user ids",
        ));
    }

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::invalid(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }

    Ok(())
}

fn validate_engine_config(engine: &EngineConfig) -> ConfigResult<()> {
    if engine.outgoing_buffer == 0 {
        return Err(ConfigError::invalid(
            "engine.outgoing_buffer must be greater than 0",
        ));
    }

    if engine.ack_timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "engine.ack_timeout_secs must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_chat_config(chat: &ChatConfig) -> ConfigResult<()> {
    for channel in &chat.join_channels {
        let name = channel.trim_start_matches('#');
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(format!(
                "Invalid channel name in chat.join_channels: {channel:?}"
            )));
        }
    }

    if !chat.web_base_url.is_empty()
        && !["http://", "https://"]
            .iter()
            .any(|scheme| chat.web_base_url.starts_with(scheme))
    {
        return Err(ConfigError::invalid(format!(
            "chat.web_base_url must be an http(s) URL: {}",
            chat.web_base_url
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_engine_bounds() {
        let mut config = ParleyConfig::default();
        config.engine.ack_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ParleyConfig::default();
        config.engine.outgoing_buffer = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_channel_names() {
        let mut config = ParleyConfig::default();
        config.chat.join_channels = vec!["#general".into(), "ops".into()];
        assert!(validate_config(&config).is_ok());

        config.chat.join_channels.push("two words".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = ParleyConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("parley.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
