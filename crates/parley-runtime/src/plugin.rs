//! Plugin registry and capability traits.
//!
//! Plugins are registered on a [`PluginRegistry`] before the runtime starts,
//! one typed call per capability:
//!
//! - [`ChatPlugin`]: registers listeners on the bot during startup.
//! - [`HelpProvider`]: describes the plugin's commands for `!help`.
//!
//! A plugin implementing both is registered twice, sharing one `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! let meeting = Arc::new(MeetingPlugin::default());
//! let mut plugins = PluginRegistry::new();
//! plugins.register_chat(meeting.clone()).register_help(meeting);
//! ```

use std::fmt;
use std::sync::Arc;

use parley_core::Bot;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::config::{ConfigError, ConfigResult, ParleyConfig};
use crate::error::RuntimeResult;
use crate::mood::MoodState;
use crate::strings::StringRegistry;

/// One command a plugin understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// How to invoke it, e.g. `!join M<n>`.
    pub usage: String,
    /// What it does.
    pub help_text: String,
}

impl Command {
    pub fn new(usage: impl Into<String>, help_text: impl Into<String>) -> Self {
        Self {
            usage: usage.into(),
            help_text: help_text.into(),
        }
    }
}

/// What a plugin tells `!help` about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpTopic {
    pub name: String,
    pub description: String,
    pub commands: Vec<Command>,
}

/// A plugin that reacts to chat traffic.
pub trait ChatPlugin: Send + Sync {
    /// Name of the plugin, also the key of its `[plugins.<name>]` section.
    fn name(&self) -> &str;

    /// Registers the plugin's listeners. Runs once, before the first event.
    fn init(&self, ctx: &PluginContext) -> RuntimeResult<()>;
}

/// A plugin with a help topic.
pub trait HelpProvider: Send + Sync {
    fn help(&self) -> HelpTopic;
}

/// Everything a plugin may use during and after initialization.
#[derive(Clone)]
pub struct PluginContext {
    bot: Bot,
    config: Arc<ParleyConfig>,
    strings: Arc<StringRegistry>,
    mood: Arc<MoodState>,
    help: Arc<Vec<HelpTopic>>,
}

impl PluginContext {
    pub fn new(
        bot: Bot,
        config: Arc<ParleyConfig>,
        strings: Arc<StringRegistry>,
        mood: Arc<MoodState>,
    ) -> Self {
        Self {
            bot,
            config,
            strings,
            mood,
            help: Arc::new(Vec::new()),
        }
    }

    pub(crate) fn with_help(mut self, help: Vec<HelpTopic>) -> Self {
        self.help = Arc::new(help);
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn strings(&self) -> &Arc<StringRegistry> {
        &self.strings
    }

    pub fn mood(&self) -> &Arc<MoodState> {
        &self.mood
    }

    /// Help topics of every registered [`HelpProvider`].
    pub fn help_topics(&self) -> &[HelpTopic] {
        &self.help
    }

    /// Deserializes the `[plugins.<plugin>]` section.
    ///
    /// A missing section yields `T::default()`.
    pub fn plugin_config<T>(&self, plugin: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.config.plugin_section(plugin) {
            Some(section) => T::deserialize(section)
                .map_err(|e| ConfigError::plugin_section(plugin, e)),
            None => Ok(T::default()),
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("bot", &self.bot)
            .field("help_topics", &self.help.len())
            .finish_non_exhaustive()
    }
}

/// The plugins of one runtime, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    chat: Vec<Arc<dyn ChatPlugin>>,
    help: Vec<Arc<dyn HelpProvider>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_chat(&mut self, plugin: Arc<dyn ChatPlugin>) -> &mut Self {
        info!(plugin = plugin.name(), "Registered chat plugin");
        self.chat.push(plugin);
        self
    }

    pub fn register_help(&mut self, provider: Arc<dyn HelpProvider>) -> &mut Self {
        self.help.push(provider);
        self
    }

    /// Names of the registered chat plugins.
    pub fn chat_plugins(&self) -> Vec<&str> {
        self.chat.iter().map(|p| p.name()).collect()
    }

    /// Collects every help topic.
    pub fn help_topics(&self) -> Vec<HelpTopic> {
        self.help.iter().map(|p| p.help()).collect()
    }

    /// Initializes the chat plugins in registration order, stopping at the
    /// first failure.
    pub fn init_chat_plugins(&self, ctx: &PluginContext) -> RuntimeResult<()> {
        for plugin in &self.chat {
            if let Err(e) = plugin.init(ctx) {
                error!(plugin = plugin.name(), error = %e, "Plugin failed to initialize");
                return Err(e);
            }
            info!(plugin = plugin.name(), "Plugin initialized");
        }
        Ok(())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("chat", &self.chat_plugins())
            .field("help", &self.help.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use parley_core::LoopbackApi;
    use serde::Deserialize;

    use crate::error::RuntimeError;

    struct Recorder {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ChatPlugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&self, _ctx: &PluginContext) -> RuntimeResult<()> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(RuntimeError::plugin(self.name, "boom"));
            }
            Ok(())
        }
    }

    impl HelpProvider for Recorder {
        fn help(&self) -> HelpTopic {
            HelpTopic {
                name: self.name.to_string(),
                description: "records".into(),
                commands: vec![Command::new("!record", "Records")],
            }
        }
    }

    fn context(config: ParleyConfig) -> PluginContext {
        let (bot, _loop) = Bot::builder(Arc::new(LoopbackApi::new())).build();
        PluginContext::new(
            bot,
            Arc::new(config),
            Arc::new(StringRegistry::new()),
            Arc::new(MoodState::default()),
        )
    }

    #[test]
    fn test_init_in_order_and_stop_at_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let plugin = |name, fail| {
            Arc::new(Recorder {
                name,
                fail,
                log: Arc::clone(&log),
            })
        };

        let mut registry = PluginRegistry::new();
        let first = plugin("first", false);
        registry
            .register_chat(first.clone())
            .register_help(first)
            .register_chat(plugin("broken", true))
            .register_chat(plugin("never", false));

        assert_eq!(registry.chat_plugins(), ["first", "broken", "never"]);
        assert_eq!(registry.help_topics()[0].commands[0].usage, "!record");

        let result = registry.init_chat_plugins(&context(ParleyConfig::default()));
        assert!(matches!(result, Err(RuntimeError::Plugin { ref plugin, .. }) if plugin == "broken"));
        assert_eq!(*log.lock(), ["first", "broken"]);
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct RoomsConfig {
        #[serde(default)]
        conf_rooms: Vec<String>,
    }

    #[test]
    fn test_plugin_config_sections() {
        let mut config = ParleyConfig::default();
        config.plugins.insert(
            "meeting".into(),
            serde_json::json!({ "conf_rooms": ["room1"] }),
        );
        config
            .plugins
            .insert("broken".into(), serde_json::json!({ "conf_rooms": 7 }));
        let ctx = context(config);

        let rooms: RoomsConfig = ctx.plugin_config("meeting").unwrap();
        assert_eq!(rooms.conf_rooms, ["room1"]);

        let missing: RoomsConfig = ctx.plugin_config("absent").unwrap();
        assert_eq!(missing, RoomsConfig::default());

        let broken = ctx.plugin_config::<RoomsConfig>("broken");
        assert!(matches!(broken, Err(ConfigError::PluginSection { .. })));
    }
}
