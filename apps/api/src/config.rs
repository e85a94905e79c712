use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::generation::balancer::BalancerConfig;
use crate::generation::orchestrator::PipelineSettings;
use crate::llm_client::{ClientSettings, RetryPolicy};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub generation_api_url: String,
    pub generation_api_key: String,
    pub generation_model: Option<String>,
    pub generation_timeout_secs: u64,
    pub generation_max_attempts: u32,
    pub generation_retry_backoff_ms: u64,
    pub open_ended_first_cap: usize,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            generation_api_url: require_env("GENERATION_API_URL")?,
            generation_api_key: require_env("GENERATION_API_KEY")?,
            generation_model: optional_env("GENERATION_MODEL"),
            generation_timeout_secs: parse_env("GENERATION_TIMEOUT_SECS", 90)?,
            generation_max_attempts: parse_env("GENERATION_MAX_ATTEMPTS", 3)?,
            generation_retry_backoff_ms: parse_env("GENERATION_RETRY_BACKOFF_MS", 1000)?,
            open_ended_first_cap: parse_env("OPEN_ENDED_FIRST_CAP", 2)?,
            redis_url: optional_env("REDIS_URL"),
            cache_ttl_secs: parse_env("CACHE_TTL_SECS", 3600)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.generation_api_url.clone(),
            api_key: self.generation_api_key.clone(),
            model: self.generation_model.clone(),
            timeout: self.request_timeout(),
            retry: RetryPolicy {
                max_attempts: self.generation_max_attempts,
                backoff: Duration::from_millis(self.generation_retry_backoff_ms),
            },
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            request_timeout: self.request_timeout(),
            balancer: BalancerConfig {
                open_ended_first_cap: self.open_ended_first_cap,
            },
            ..PipelineSettings::default()
        }
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
    parse_setting(key, optional_env(key).as_deref(), default)
}

fn parse_setting<T>(key: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}
