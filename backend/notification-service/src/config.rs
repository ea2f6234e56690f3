use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub push: PushConfig,
    pub realtime: RealtimeConfig,
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
pub struct PushConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub receipt_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 5,
            client_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let realtime = RealtimeConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: env_or("APP_PORT", 8000)?,
            },
            database: DatabaseConfig {
                url: non_empty_var("DATABASE_URL"),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            push: PushConfig {
                api_url: non_empty_var("EXPO_API_URL")
                    .unwrap_or_else(|| "https://exp.host".to_string()),
                access_token: non_empty_var("EXPO_ACCESS_TOKEN"),
                receipt_interval_secs: env_or("PUSH_RECEIPT_INTERVAL_SECS", 900)?,
            },
            realtime: RealtimeConfig {
                heartbeat_interval_secs: env_or(
                    "WS_HEARTBEAT_INTERVAL_SECS",
                    realtime.heartbeat_interval_secs,
                )?,
                client_timeout_secs: env_or(
                    "WS_CLIENT_TIMEOUT_SECS",
                    realtime.client_timeout_secs,
                )?,
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
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
