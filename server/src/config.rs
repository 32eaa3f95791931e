//! Configuration management for the server.

use shelf_engine::StoreConfig;
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Fail expansion on dangling references
    pub strict_references: bool,
    /// Page size when a query has no `limit`
    pub default_limit: usize,
    /// Largest page a query may request
    pub max_limit: usize,
    /// Compiled predicates kept by the store
    pub predicate_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8989,
            strict_references: store.strict_references,
            default_limit: store.default_limit,
            max_limit: store.max_limit,
            predicate_cache_size: store.predicate_cache_size,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let strict_references = match lookup("STRICT_REFERENCES") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidBool("STRICT_REFERENCES"))?,
            None => defaults.strict_references,
        };

        let default_limit = parse_limit(&lookup, "DEFAULT_LIMIT", defaults.default_limit)?;
        let max_limit = parse_limit(&lookup, "MAX_LIMIT", defaults.max_limit)?;
        let predicate_cache_size = parse_limit(
            &lookup,
            "PREDICATE_CACHE_SIZE",
            defaults.predicate_cache_size,
        )?;

        Ok(Self {
            host,
            port,
            strict_references,
            default_limit,
            max_limit,
            predicate_cache_size,
        })
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_strict_references(self.strict_references)
            .with_default_limit(self.default_limit)
            .with_max_limit(self.max_limit)
            .with_predicate_cache_size(self.predicate_cache_size)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_limit(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match lookup(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid boolean value for {0}")]
    InvalidBool(&'static str),

    #[error("Invalid number for {0}")]
    InvalidNumber(&'static str),
}
