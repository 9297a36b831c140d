//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (prefix: EFFECTUAL_)
//! 2. Current working directory: ./config.toml
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effect::{DEFAULT_CONSUME_TIMEOUT_MS, DEFAULT_LIST_MAX_KEYS};

/// Configuration could not be loaded or parsed.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] Box<figment::Error>);

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service-level configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Cache family configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Messaging family configuration
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Storage family configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metrics family configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            cache: CacheConfig::default(),
            messaging: MessagingConfig::default(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, `./config.toml`, and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("EFFECTUAL_").split("__"))
            .extract()
            .map_err(Box::new)?;
        Ok(config)
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name used in logs
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

/// Cache family configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when callers build cache writes without one
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_seconds: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Messaging family configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Consume wait applied when callers build consumes without one
    #[serde(default = "default_consume_timeout")]
    pub default_consume_timeout_ms: u32,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            default_consume_timeout_ms: default_consume_timeout(),
        }
    }
}

/// Storage family configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Page size applied when callers build listings without one
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

/// Metrics family configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether `ResetMetrics` is honored. Keep off outside test
    /// environments.
    #[serde(default = "default_false")]
    pub allow_reset: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            allow_reset: default_false(),
        }
    }
}

fn default_service_name() -> String {
    "effectual".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_cache_ttl() -> u32 {
    300
}

fn default_consume_timeout() -> u32 {
    DEFAULT_CONSUME_TIMEOUT_MS
}

fn default_page_size() -> u32 {
    DEFAULT_LIST_MAX_KEYS
}

fn default_false() -> bool {
    false
}
