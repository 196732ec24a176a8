//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `cinder.toml`
//! - `yaml-config`: enables `cinder.yaml` / `cinder.yml`
//!
//! Both can be enabled at once; each format is searched independently.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`cinder.{profile}.toml`)
//! 4. Main config file (`cinder.toml`)
//! 5. Environment variables (`CINDER_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `CINDER_` prefix with `__` as the nesting separator:
//!
//! - `CINDER_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `CINDER_SERVICES__PROFILE=prod` → `services.profile = "prod"`
//! - `CINDER_TIMEOUTS__DEFAULT_TIMEOUT_MS=60000` → `timeouts.default_timeout_ms = 60000`
//!
//! `CINDER_PROFILE` picks the profile file and, unless `services.profile`
//! is set elsewhere, the active service profile.
//!
//! # Example
//!
//! ```rust,ignore
//! use cinder_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CinderConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "CINDER_";
const PROFILE_ENV: &str = "CINDER_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Parses a profile name; `dev` and `prod` are accepted as shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            _ => Self::Custom(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `CINDER_PROFILE`.
    pub fn from_env() -> Option<Self> {
        std::env::var(PROFILE_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(|p| Self::parse(&p))
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    /// Explicitly chosen profile; `None` falls back to `CINDER_PROFILE`.
    profile: Option<Profile>,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: None,
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Some(Profile::parse(profile.as_ref()));
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/cinder` to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("cinder")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, below files and environment.
    pub fn merge(mut self, config: CinderConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<CinderConfig> {
        let profile = self.effective_profile();
        let explicit = self.profile.is_some() || (self.load_env && Profile::from_env().is_some());
        let figment = self.build_figment(&profile)?;

        let mut config: CinderConfig = figment.extract()?;
        if explicit && config.services.profile.is_none() {
            config.services.profile = Some(profile.as_str().to_string());
        }
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            services_profile = ?config.services.profile,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn effective_profile(&self) -> Profile {
        self.profile
            .clone()
            .or_else(|| self.load_env.then(Profile::from_env).flatten())
            .unwrap_or_default()
    }

    fn build_figment(mut self, profile: &Profile) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CinderConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment, profile);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment)
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("cinder"));
        }
        paths
    }

    /// Walks `search_paths × base_names`: the profile variant is merged
    /// first, then the base file, which ends the search for this format.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        profile: &Profile,
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        let mut found = false;
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{profile}.{ext}"));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                    found = true;
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, found)
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables, unused_mut)
    )]
    fn load_config_files(&self, mut figment: Figment, profile: &Profile) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = Self::load_format_files(
                figment,
                &search_paths,
                &["cinder.toml"],
                profile,
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = Self::load_format_files(
                figment,
                &search_paths,
                &["cinder.yaml", "cinder.yml"],
                profile,
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<CinderConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CinderConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.services.profile, None);
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".to_string()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Some(Profile::Production));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_layers_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cinder.toml",
                r#"
                [logging]
                level = "warn"

                [timeouts]
                default_timeout_ms = 1000
                "#,
            )?;
            jail.create_file(
                "cinder.staging.toml",
                r#"
                [services]
                debug = true
                "#,
            )?;
            jail.set_env("CINDER_TIMEOUTS__DEFAULT_TIMEOUT_MS", "2000");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .profile("staging")
                .load()
                .unwrap();

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert!(config.services.debug);
            assert_eq!(config.services.profile.as_deref(), Some("staging"));
            assert_eq!(config.timeouts.default_timeout_ms, 2000);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_file_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cinder.toml",
                r#"
                [timeouts]
                default_timeout_ms = 0
                "#,
            )?;

            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/cinder.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_merge_programmatic() {
        Jail::expect_with(|jail| {
            let mut overrides = CinderConfig::default();
            overrides.services.debug = true;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .merge(overrides)
                .load()
                .unwrap();
            assert!(config.services.debug);
            Ok(())
        });
    }
}
