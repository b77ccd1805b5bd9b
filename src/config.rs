use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::cache::CacheStrategy;

pub const DEFAULT_CACHE_MAX_SIZE: usize = 50;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub strategy: CacheStrategy,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_ttl", with = "ttl_secs")]
    pub ttl: Duration,
}

fn default_max_size() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

fn default_ttl() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_TTL_SECS)
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::default(),
            max_size: DEFAULT_CACHE_MAX_SIZE,
            ttl: default_ttl(),
        }
    }
}

/// Whether the execution stage talks to the hub or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Live,
    Simulate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HearthConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub execution: ExecutionMode,
    pub llm_url: Option<String>,
    pub hub_url: Option<String>,
    pub hub_token: Option<String>,
}

impl HearthConfig {
    /// Reads `HEARTH_*` variables. Bad values are logged and replaced by defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = HearthConfig::default();

        if let Some(raw) = lookup("HEARTH_CACHE_STRATEGY") {
            config.cache.strategy = parse_or_default("HEARTH_CACHE_STRATEGY", &raw);
        }
        if let Some(raw) = lookup("HEARTH_CACHE_MAX_SIZE") {
            config.cache.max_size = parse_or(
                "HEARTH_CACHE_MAX_SIZE",
                &raw,
                DEFAULT_CACHE_MAX_SIZE,
            );
        }
        if let Some(raw) = lookup("HEARTH_CACHE_TTL_SECS") {
            let secs = parse_or("HEARTH_CACHE_TTL_SECS", &raw, DEFAULT_CACHE_TTL_SECS);
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("HEARTH_SIMULATE") {
            if matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                config.execution = ExecutionMode::Simulate;
            }
        }

        config.llm_url = lookup("HEARTH_LLM_URL").filter(|s| !s.trim().is_empty());
        config.hub_url = lookup("HEARTH_HUB_URL").filter(|s| !s.trim().is_empty());
        config.hub_token = lookup("HEARTH_HUB_TOKEN").filter(|s| !s.trim().is_empty());

        config
    }
}

fn parse_or_default<T: FromStr + Default>(key: &str, raw: &str) -> T {
    parse_or(key, raw, T::default())
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }
    }
}
