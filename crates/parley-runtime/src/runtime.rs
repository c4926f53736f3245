//! Runtime orchestration.
//!
//! [`ParleyRuntime`] owns the loaded configuration, the plugin registry and
//! the state shared between plugins. Running it builds the [`Bot`] and its
//! [`EventLoop`](parley_core::EventLoop), initializes every chat plugin, then
//! drives the loop until the event stream ends or a shutdown is requested.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_runtime::ParleyRuntime;
//!
//! let mut runtime = ParleyRuntime::builder()
//!     .config_file("deploy/parley.toml")
//!     .profile("production")
//!     .build()?;
//!
//! let meeting = Arc::new(MeetingPlugin::default());
//! runtime.register_chat(meeting.clone()).register_help(meeting);
//! runtime.run(api, events).await?;
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_core::{Bot, BoxedChatApi, ChatEvent, GroupMembership, MemoryGroups};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::{ConfigLoader, ConfigResult, ParleyConfig};
use crate::error::RuntimeResult;
use crate::help::HelpPlugin;
use crate::logging;
use crate::mood::MoodState;
use crate::plugin::{ChatPlugin, HelpProvider, PluginContext, PluginRegistry};
use crate::strings::StringRegistry;

/// The Parley runtime.
pub struct ParleyRuntime {
    config: Arc<ParleyConfig>,
    plugins: PluginRegistry,
    strings: Arc<StringRegistry>,
    mood: Arc<MoodState>,
    groups: Option<Arc<dyn GroupMembership>>,
    /// Flushes file logging on drop.
    _log_guard: Option<WorkerGuard>,
}

impl ParleyRuntime {
    /// Starts a builder that loads configuration from files and the environment.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Installs the global log subscriber unless one is already set, and
    /// registers the built-in `!help` plugin.
    pub fn from_config(config: ParleyConfig) -> Self {
        let log_guard = logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            join_channels = ?config.chat.join_channels,
            "Runtime configured"
        );

        let mut plugins = PluginRegistry::new();
        plugins.register_chat(Arc::new(HelpPlugin));

        Self {
            config: Arc::new(config),
            plugins,
            strings: Arc::new(StringRegistry::new()),
            mood: Arc::new(MoodState::default()),
            groups: None,
            _log_guard: log_guard,
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Registers a chat plugin. Plugins initialize in registration order.
    pub fn register_chat(&mut self, plugin: Arc<dyn ChatPlugin>) -> &mut Self {
        self.plugins.register_chat(plugin);
        self
    }

    /// Registers a help topic provider.
    pub fn register_help(&mut self, provider: Arc<dyn HelpProvider>) -> &mut Self {
        self.plugins.register_help(provider);
        self
    }

    /// Canned phrases shared by plugins.
    pub fn strings(&self) -> &Arc<StringRegistry> {
        &self.strings
    }

    pub fn mood(&self) -> &Arc<MoodState> {
        &self.mood
    }

    /// Replaces the group membership lookup.
    ///
    /// Defaults to an in-memory store seeded with `global_admins`.
    pub fn with_groups(mut self, groups: Arc<dyn GroupMembership>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Runs until the event stream ends, Ctrl+C or SIGTERM.
    pub async fn run(
        self,
        api: BoxedChatApi,
        events: mpsc::Receiver<ChatEvent>,
    ) -> RuntimeResult<()> {
        info!("Parley runtime is now running. Press Ctrl+C to stop.");
        self.run_until(api, events, wait_for_shutdown()).await
    }

    /// Runs until the event stream ends or `shutdown` completes.
    pub async fn run_until<F>(
        self,
        api: BoxedChatApi,
        events: mpsc::Receiver<ChatEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let _pid_file = PidFile::create(self.config.pid_path.as_deref())?;

        let groups = self.groups.clone().unwrap_or_else(|| {
            Arc::new(MemoryGroups::with_global_admins(
                self.config.global_admins.iter().cloned(),
            ))
        });
        let (bot, event_loop) = Bot::builder(api)
            .config(self.config.engine.clone())
            .groups(groups)
            .join_channels(self.config.chat.join_channels.iter().cloned())
            .build();

        let ctx = PluginContext::new(
            bot,
            Arc::clone(&self.config),
            Arc::clone(&self.strings),
            Arc::clone(&self.mood),
        )
        .with_help(self.plugins.help_topics());
        self.plugins.init_chat_plugins(&ctx)?;

        debug!(
            plugins = ?self.plugins.chat_plugins(),
            listeners = ctx.bot().active_listeners(),
            "Plugins initialized, starting event loop"
        );

        tokio::select! {
            result = event_loop.run(events) => {
                match &result {
                    Ok(()) => info!("Event stream ended"),
                    Err(e) => error!(error = %e, "Event loop stopped with an error"),
                }
                result?;
            }
            _ = shutdown => {
                info!("Shutdown requested");
            }
        }

        info!("Runtime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ParleyRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParleyRuntime")
            .field("plugins", &self.plugins)
            .field("pid_path", &self.config.pid_path)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => info!("Interrupted, stopping"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
                info!("Interrupted, stopping");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Interrupted, stopping");
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// The process id written to disk, removed again on drop.
#[derive(Debug)]
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn create(path: Option<&Path>) -> RuntimeResult<Option<Self>> {
        let Some(path) = path else {
            return Ok(None);
        };
        std::fs::write(path, std::process::id().to_string())?;
        info!(path = %path.display(), "Wrote PID file");
        Ok(Some(Self {
            path: path.to_path_buf(),
        }))
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove PID file");
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`ParleyRuntime`] with custom configuration loading.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = ParleyRuntime::builder()
///     .config_file("deploy/parley.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
        }
    }

    /// Reads configuration from exactly this file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    /// Ignores `PARLEY_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges configuration below files and environment.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<ParleyRuntime> {
        let config = self.loader.load()?;
        Ok(ParleyRuntime::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{ApiCall, Channel, DirectorySnapshot, LoopbackApi, SelfInfo, User};

    fn api() -> LoopbackApi {
        LoopbackApi::new().with_directory(DirectorySnapshot {
            users: vec![User::new("U1", "alice"), User::new("UBOT", "parley")],
            channels: vec![Channel::new("C1", "general")],
        })
    }

    #[test]
    fn test_pid_file_lifecycle() {
        let path = std::env::temp_dir().join(format!("parley-pid-{}.pid", std::process::id()));

        assert!(PidFile::create(None).unwrap().is_none());

        let pid = PidFile::create(Some(&path)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
        drop(pid);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_ends_with_event_stream() {
        let api = api();
        let mut calls = api.observe();
        let (events_tx, events_rx) = mpsc::channel(8);

        let mut config = ParleyConfig::default();
        config.chat.join_channels = vec!["general".into()];
        let runtime = ParleyRuntime::from_config(config);
        let task = tokio::spawn(runtime.run_until(
            Arc::new(api),
            events_rx,
            std::future::pending(),
        ));

        events_tx
            .send(ChatEvent::Connected {
                myself: SelfInfo {
                    id: "UBOT".into(),
                    name: "parley".into(),
                },
                connection_count: 1,
            })
            .await
            .unwrap();

        let mut joined = None;
        while let Some(call) = calls.recv().await {
            if let ApiCall::JoinChannel { name } = call {
                joined = Some(name);
                break;
            }
        }
        assert_eq!(joined.as_deref(), Some("general"));

        drop(events_tx);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_the_runtime() {
        let (_events_tx, events_rx) = mpsc::channel(8);
        let runtime = ParleyRuntime::from_config(ParleyConfig::default());
        let result = runtime
            .run_until(Arc::new(api()), events_rx, async {})
            .await;
        assert!(result.is_ok());
    }

    struct Failing;

    impl ChatPlugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn init(&self, _ctx: &PluginContext) -> RuntimeResult<()> {
            Err(crate::error::RuntimeError::plugin("failing", "no rooms"))
        }
    }

    #[tokio::test]
    async fn test_plugin_failure_aborts_startup() {
        let (_events_tx, events_rx) = mpsc::channel(8);
        let mut runtime = ParleyRuntime::from_config(ParleyConfig::default());
        runtime.register_chat(Arc::new(Failing));
        assert_eq!(runtime.plugins_mut().chat_plugins(), ["help", "failing"]);

        let result = runtime
            .run_until(Arc::new(api()), events_rx, std::future::pending())
            .await;
        assert!(matches!(
            result,
            Err(crate::error::RuntimeError::Plugin { ref plugin, .. }) if plugin == "failing"
        ));
    }
}
