#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for the plugpm resolver
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/plugpm/resolver.toml)
//! - Environment variables

pub mod constants;

use constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_MAX_DEPTH,
    DEFAULT_SOLVER_NODE_BUDGET,
};
use plugpm_errors::{ConfigError, Error};
use plugpm_types::StrategyKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolver: ResolutionConfig,

    #[serde(default)]
    pub catalogue: CatalogueConfig,
}

/// Defaults applied to every resolve request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub allow_snapshot: bool,
    #[serde(default = "default_keep")]
    pub keep: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_solver_node_budget")]
    pub solver_node_budget: u64,
}

/// Catalogue snapshot caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64, // 0 = always refresh
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Cudf,
            allow_snapshot: false,
            keep: true,
            max_depth: DEFAULT_MAX_DEPTH,
            solver_node_budget: DEFAULT_SOLVER_NODE_BUDGET,
        }
    }
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

// Default value functions for serde
fn default_keep() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_solver_node_budget() -> u64 {
    DEFAULT_SOLVER_NODE_BUDGET
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

impl ResolverConfig {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure or
    /// if a value fails validation.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        tracing::debug!(path = %path.display(), "loaded resolver configuration");
        Self::from_toml(&contents)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides looked up through `lookup`, keyed by the
    /// `PLUGPM_*` environment variable names
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for values that do not parse.
    pub fn merge_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PLUGPM_RESOLVER_STRATEGY
        if let Some(strategy) = lookup("PLUGPM_RESOLVER_STRATEGY") {
            self.resolver.strategy =
                strategy
                    .parse()
                    .map_err(|_: String| ConfigError::InvalidValue {
                        field: "PLUGPM_RESOLVER_STRATEGY".to_string(),
                        value: strategy.clone(),
                    })?;
        }

        // PLUGPM_ALLOW_SNAPSHOT
        if let Some(value) = lookup("PLUGPM_ALLOW_SNAPSHOT") {
            self.resolver.allow_snapshot = parse_flag("PLUGPM_ALLOW_SNAPSHOT", value)?;
        }

        // PLUGPM_KEEP
        if let Some(value) = lookup("PLUGPM_KEEP") {
            self.resolver.keep = parse_flag("PLUGPM_KEEP", value)?;
        }

        // PLUGPM_MAX_DEPTH
        if let Some(depth) = lookup("PLUGPM_MAX_DEPTH") {
            self.resolver.max_depth = depth.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PLUGPM_MAX_DEPTH".to_string(),
                value: depth,
            })?;
        }

        // PLUGPM_CACHE_TTL
        if let Some(ttl) = lookup("PLUGPM_CACHE_TTL") {
            self.catalogue.cache_ttl_seconds =
                ttl.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PLUGPM_CACHE_TTL".to_string(),
                    value: ttl,
                })?;
        }

        self.validate()
    }

    fn validate(&self) -> Result<(), Error> {
        if self.resolver.max_depth == 0 {
            return Err(ConfigError::Invalid {
                message: "resolver.max_depth must be at least 1".to_string(),
            }
            .into());
        }
        if self.resolver.solver_node_budget == 0 {
            return Err(ConfigError::Invalid {
                message: "resolver.solver_node_budget must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Configured resolution strategy
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.resolver.strategy
    }

    /// Catalogue cache time-to-live
    #[must_use]
    pub fn cache_ttl(&self) -> chrono::Duration {
        let seconds = i64::try_from(self.catalogue.cache_ttl_seconds).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(seconds).unwrap_or(chrono::Duration::MAX)
    }
}

fn parse_flag(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
