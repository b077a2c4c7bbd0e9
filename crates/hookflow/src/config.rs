use std::time::Duration;

use crate::jobs::engine::EngineConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub workers: usize,
    pub max_retries: i32,
    pub tick_ms: u64,
    pub channel_capacity: usize,
    pub request_timeout_secs: u64,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_or_fallback("HOOKFLOW_DATABASE_URL", "DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("HOOKFLOW_DATABASE_URL is missing"))?;

        let listen_addr = env_or_fallback("HOOKFLOW_LISTEN_ADDR", "LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let workers = env_parsed("HOOKFLOW_WORKERS").unwrap_or(3);

        let max_retries = env_parsed("HOOKFLOW_MAX_RETRIES").unwrap_or(3);

        let tick_ms = env_parsed("HOOKFLOW_TICK_MS").unwrap_or(5_000);

        let channel_capacity = env_parsed("HOOKFLOW_CHANNEL_CAPACITY").unwrap_or(100);

        let request_timeout_secs = env_parsed("HOOKFLOW_REQUEST_TIMEOUT_SECS").unwrap_or(30);

        let migrate_on_startup = env_bool("HOOKFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        Ok(Self {
            database_url,
            listen_addr,
            workers,
            max_retries,
            tick_ms,
            channel_capacity,
            request_timeout_secs,
            migrate_on_startup,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers,
            max_retries: self.max_retries,
            tick: Duration::from_millis(self.tick_ms),
            channel_capacity: self.channel_capacity,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
