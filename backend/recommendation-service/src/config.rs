use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub sweep: SweepSettings,
    pub suggestions: SuggestionLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Absent means the in-memory store (development only)
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionLimits {
    pub friend_limit: usize,
    pub friend_fallback_limit: usize,
    pub event_limit: usize,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            friend_limit: 20,
            friend_fallback_limit: 5,
            event_limit: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let limits = SuggestionLimits::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: env_or("APP_PORT", 8080)?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            sweep: SweepSettings {
                enabled: env_or("SUGGESTION_SWEEP_ENABLED", true)?,
                interval_secs: env_or("SUGGESTION_SWEEP_INTERVAL_SECS", 360)?,
                initial_delay_secs: env_or("SUGGESTION_SWEEP_INITIAL_DELAY_SECS", 10)?,
                concurrency: env_or("SUGGESTION_SWEEP_CONCURRENCY", 4)?,
            },
            suggestions: SuggestionLimits {
                friend_limit: env_or("FRIEND_SUGGESTION_LIMIT", limits.friend_limit)?,
                friend_fallback_limit: env_or(
                    "FRIEND_FALLBACK_LIMIT",
                    limits.friend_fallback_limit,
                )?,
                event_limit: env_or("EVENT_SUGGESTION_LIMIT", limits.event_limit)?,
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
