//! Layered configuration.
//!
//! Sources are merged in this order, each one overriding the previous:
//!
//! 1. [`ParleyConfig::default`]
//! 2. values passed to [`ConfigLoader::merge`]
//! 3. `parley.<profile>.toml`
//! 4. `parley.toml` (`config.toml` is accepted as well)
//! 5. `PARLEY_*` variables, with `__` between nesting levels, so
//!    `PARLEY_ENGINE__ACK_TIMEOUT_SECS=30` sets `engine.ack_timeout_secs`
//!
//! Without an explicit [`ConfigLoader::file`], the working directory is
//! tried first and then `parley/` under the platform config directory. The
//! first directory holding a base file is the only one used.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./deploy/parley.toml")
//!     .profile("production")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ParleyConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "PARLEY_";
const FILE_STEMS: [&str; 2] = ["parley", "config"];

/// Selects the `parley.<profile>.toml` overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    /// Lowercases `name` and expands `dev` and `prod`.
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self(match name.as_str() {
            "dev" => "development".to_string(),
            "prod" => "production".to_string(),
            _ => name,
        })
    }

    /// `PARLEY_PROFILE`, or development when unset.
    pub fn from_env() -> Self {
        std::env::var("PARLEY_PROFILE")
            .map(|name| Self::new(&name))
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self("development".to_string())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a [`ParleyConfig`] out of defaults, files and the environment.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    dirs: Vec<PathBuf>,
    explicit: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            dirs: Vec::new(),
            explicit: None,
            env: true,
        }
    }

    pub fn profile(mut self, name: impl AsRef<str>) -> Self {
        self.profile = Profile::new(name.as_ref());
        self
    }

    /// Looks for files in `dir`. Once set, the default directories are skipped.
    pub fn search_path<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.dirs.push(dir.as_ref().to_path_buf());
        self
    }

    /// Reads exactly this file, which must exist. Disables the search.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` right above the defaults.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<ParleyConfig> {
        let profile = self.profile.clone();
        let config: ParleyConfig = self
            .layers()?
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;
        validate_config(&config)?;

        debug!(
            %profile,
            level = %config.logging.level,
            plugins = config.plugins.len(),
            "Configuration ready"
        );
        Ok(config)
    }

    fn layers(self) -> ConfigResult<Figment> {
        let files = match &self.explicit {
            Some(path) if !path.exists() => return Err(ConfigError::MissingFile(path.clone())),
            Some(path) => vec![path.clone()],
            None => {
                let found = discover(&self.directories(), &self.profile);
                if found.is_empty() {
                    warn!("No configuration file found, running on defaults");
                }
                found
            }
        };

        let mut figment = Figment::from(Serialized::defaults(ParleyConfig::default()))
            .merge(self.overrides);
        for path in &files {
            info!(path = %path.display(), "Reading configuration file");
            figment = read_file(figment, path)?;
        }
        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment)
    }

    fn directories(&self) -> Vec<PathBuf> {
        if !self.dirs.is_empty() {
            return self.dirs.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("parley")))
            .collect()
    }
}

/// Files to merge, lowest priority first: the profile overlay, then the base.
fn discover(dirs: &[PathBuf], profile: &Profile) -> Vec<PathBuf> {
    if !cfg!(feature = "toml-config") {
        return Vec::new();
    }
    for dir in dirs {
        for stem in FILE_STEMS {
            let base = dir.join(format!("{stem}.toml"));
            if !base.is_file() {
                continue;
            }
            let overlay = dir.join(format!("{stem}.{profile}.toml"));
            return if overlay.is_file() {
                vec![overlay, base]
            } else {
                vec![base]
            };
        }
    }
    Vec::new()
}

fn read_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "toml-config")]
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        other => Err(ConfigError::Extract(format!(
            "{} has no supported format (extension {:?})",
            path.display(),
            other.unwrap_or_default()
        ))),
    }
}

/// [`ConfigLoader::new`] with nothing changed.
pub fn load_config() -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().load()
}

pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use parley_core::UnknownSenderPolicy;

    use crate::config::schema::LogLevel;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new().without_env().load().unwrap();
            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.engine.ack_timeout_secs, 20);
            assert!(config.global_admins.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "parley.toml",
                r#"
                    global_admins = ["U1"]

                    [chat]
                    join_channels = ["general", "ops"]
                    web_base_url = "https://bot.example.com"

                    [engine]
                    unknown_sender = "drop"

                    [plugins.meeting]
                    conf_rooms = ["room1", "room2"]
                "#,
            )?;
            jail.set_env("PARLEY_LOGGING__LEVEL", "debug");
            jail.set_env("PARLEY_ENGINE__ACK_TIMEOUT_SECS", "5");

            let config = ConfigLoader::new().load().unwrap();
            assert_eq!(config.chat.join_channels, ["general", "ops"]);
            assert_eq!(config.global_admins, ["U1"]);
            assert_eq!(config.engine.unknown_sender, UnknownSenderPolicy::Drop);
            assert_eq!(config.engine.ack_timeout_secs, 5);
            assert_eq!(config.engine.outgoing_buffer, 500);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(
                config.plugin_section("meeting").unwrap()["conf_rooms"][1],
                "room2"
            );
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_base() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "parley.production.toml",
                "pid_path = \"/run/parley.pid\"\n[chat]\nteam_id = \"T-prod\"",
            )?;
            jail.create_file("parley.toml", "[chat]\nteam_id = \"T-base\"")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.chat.team_id, "T-base");
            assert_eq!(config.pid_path, Some(PathBuf::from("/run/parley.pid")));
            Ok(())
        });
    }

    #[test]
    fn test_discover_stops_at_first_directory_with_a_base_file() {
        Jail::expect_with(|jail| {
            let root = jail.directory().to_path_buf();
            std::fs::create_dir(root.join("empty")).map_err(|e| e.to_string())?;
            std::fs::create_dir(root.join("etc")).map_err(|e| e.to_string())?;
            jail.create_file("etc/config.toml", "")?;
            jail.create_file("etc/config.staging.toml", "")?;
            jail.create_file("parley.toml", "")?;

            let dirs = [root.join("empty"), root.join("etc"), root.clone()];
            assert_eq!(
                discover(&dirs, &Profile::new("Staging")),
                vec![root.join("etc/config.staging.toml"), root.join("etc/config.toml")]
            );
            assert!(discover(&dirs[..1], &Profile::default()).is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let result = ConfigLoader::new().file("nope.toml").load();
            assert!(matches!(result, Err(ConfigError::MissingFile(_))));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("parley.toml", "[engine]\noutgoing_buffer = 0")?;
            let result = ConfigLoader::new().without_env().load();
            assert!(matches!(result, Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::new("PROD").name(), "production");
        assert_eq!(Profile::new("dev"), Profile::default());
        assert_eq!(Profile::new("staging").to_string(), "staging");
    }
}
