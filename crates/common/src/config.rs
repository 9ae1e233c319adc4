//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Identity provider configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// User directory configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Buffered events per subscription before a slow consumer is dropped.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Minimum accepted password length at registration.
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

/// User directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Maximum number of records returned by a directory search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

const fn default_event_capacity() -> usize {
    256
}

const fn default_min_password_length() -> usize {
    8
}

const fn default_search_limit() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            min_password_length: default_min_password_length(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `MESSENGER_ENV`)
    /// 3. Environment variables with `MESSENGER_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("MESSENGER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MESSENGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.event_capacity, 256);
        assert_eq!(config.identity.min_password_length, 8);
        assert_eq!(config.directory.search_limit, 50);
    }

    #[test]
    fn test_empty_sources_fall_back_to_defaults() {
        let config: Config = config::Config::builder()
            .build()
            .and_then(config::Config::try_deserialize)
            .unwrap();
        assert_eq!(config.store.event_capacity, 256);
    }
}
