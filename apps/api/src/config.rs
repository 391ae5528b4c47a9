use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::live::hub::MAX_CAPACITY;
use crate::notifications::{StoreOptions, ToastPosition};

/// API server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Activity log falls back to in-memory storage when unset.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Capacity of the live-update broadcast buffer per subscriber.
    pub push_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            push_buffer: check_push_buffer(parse_env("PUSH_BUFFER", 100)?)?,
        })
    }
}

/// Configuration for a notification client (`notify-watch`).
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub ws_url: String,
    pub activity_log_url: Option<String>,
    pub created_by: String,
    pub max_visible: usize,
    pub default_duration_ms: u64,
    pub persist: bool,
    pub position: ToastPosition,
    pub reconnect_ms: u64,
    pub rust_log: String,
}

impl NotifyConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let max_visible: usize = parse_env("NOTIFY_MAX_VISIBLE", 5)?;
        if max_visible == 0 {
            return Err(anyhow!("NOTIFY_MAX_VISIBLE must be at least 1"));
        }

        Ok(NotifyConfig {
            ws_url: require_env("NOTIFY_WS_URL")?,
            activity_log_url: optional_env("ACTIVITY_LOG_URL"),
            created_by: std::env::var("ACTIVITY_CREATED_BY").unwrap_or_else(|_| "system".to_string()),
            max_visible,
            default_duration_ms: parse_env("NOTIFY_DEFAULT_DURATION_MS", 5000)?,
            persist: parse_env("NOTIFY_PERSIST", false)?,
            position: std::env::var("NOTIFY_POSITION")
                .ok()
                .map(|v| v.parse::<ToastPosition>())
                .transpose()
                .map_err(|v| anyhow!("NOTIFY_POSITION has unknown value '{v}'"))?
                .unwrap_or_default(),
            reconnect_ms: parse_env("NOTIFY_RECONNECT_MS", 5000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .with_max_visible(self.max_visible)
            .with_default_duration_ms(self.default_duration_ms)
            .with_persist(self.persist)
            .with_position(self.position)
    }
}

fn check_push_buffer(value: usize) -> Result<usize> {
    if (1..=MAX_CAPACITY).contains(&value) {
        Ok(value)
    } else {
        Err(anyhow!("PUSH_BUFFER must be between 1 and {MAX_CAPACITY}, got {value}"))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}
