//! Relay configuration.
//!
//! # Environment Variables
//!
//! - `WADDLE_RELAY_DOMAIN`: Local server domain. Default: `localhost`
//! - `WADDLE_RELAY_HIGHEST_PRIORITY_ONLY`: Deliver chat/normal messages for a
//!   bare JID only to the highest-priority resources. Default: `false`
//! - `WADDLE_RELAY_WORKERS`: Core relay workers; the pool grows to twice
//!   this under load. Default: `18`
//! - `WADDLE_RELAY_KEEP_ALIVE_SECS`: Idle time before extra workers exit.
//!   Default: `120`
//! - `WADDLE_RELAY_QUEUE_CAPACITY`: Pending relay tasks held before the pool
//!   grows past its core size. Default: `1024`

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::relay::pool::{
    PoolSettings, DEFAULT_CORE_WORKERS, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_QUEUE_CAPACITY,
};
use crate::routing::RouterConfig;

const ENV_DOMAIN: &str = "WADDLE_RELAY_DOMAIN";
const ENV_HIGHEST_PRIORITY_ONLY: &str = "WADDLE_RELAY_HIGHEST_PRIORITY_ONLY";
const ENV_WORKERS: &str = "WADDLE_RELAY_WORKERS";
const ENV_KEEP_ALIVE_SECS: &str = "WADDLE_RELAY_KEEP_ALIVE_SECS";
const ENV_QUEUE_CAPACITY: &str = "WADDLE_RELAY_QUEUE_CAPACITY";

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Local server domain
    pub local_domain: String,
    /// Deliver chat/normal messages for a bare JID only to the
    /// highest-priority resources
    pub deliver_to_highest_priority_only: bool,
    /// Core workers; the maximum is twice this
    pub workers: usize,
    /// Idle seconds before extra workers exit
    pub keep_alive_secs: u64,
    /// Capacity of the pending task queue
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_domain: "localhost".to_string(),
            deliver_to_highest_priority_only: false,
            workers: DEFAULT_CORE_WORKERS,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            local_domain: lookup(ENV_DOMAIN).unwrap_or(defaults.local_domain),
            deliver_to_highest_priority_only: parse_bool(
                ENV_HIGHEST_PRIORITY_ONLY,
                lookup(ENV_HIGHEST_PRIORITY_ONLY),
            )?,
            workers: parse_var(ENV_WORKERS, lookup(ENV_WORKERS), defaults.workers)?,
            keep_alive_secs: parse_var(
                ENV_KEEP_ALIVE_SECS,
                lookup(ENV_KEEP_ALIVE_SECS),
                defaults.keep_alive_secs,
            )?,
            queue_capacity: parse_var(
                ENV_QUEUE_CAPACITY,
                lookup(ENV_QUEUE_CAPACITY),
                defaults.queue_capacity,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("local_domain must not be empty".to_string()));
        }
        self.pool_settings().validate()
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new(self.local_domain.clone())
            .with_highest_priority_only(self.deliver_to_highest_priority_only)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings::default()
            .with_max_workers(self.workers)
            .with_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .with_queue_capacity(self.queue_capacity)
    }

    /// Log the current relay configuration.
    pub fn log_config(&self) {
        info!("Relay domain: {}", self.local_domain);
        info!(
            "Relay workers: {} core, {} max",
            self.workers,
            self.workers.saturating_mul(2)
        );
        info!("Relay worker keep-alive: {}s", self.keep_alive_secs);
        info!("Relay queue capacity: {}", self.queue_capacity);
        if self.deliver_to_highest_priority_only {
            info!("Bare JID messages: highest-priority resources only");
        } else {
            info!("Bare JID messages: all non-negative priority resources");
        }
    }
}
