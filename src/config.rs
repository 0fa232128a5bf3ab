use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Maximum decimal places accepted for bid amounts and proxy ceilings.
    pub amount_scale: u32,
    /// Longest a request waits for an auction's serialization lock per attempt.
    pub lock_wait_ms: u64,
    /// Bounded internal retries after a lock-wait timeout before surfacing Busy.
    pub lock_retries: u32,
    /// Interval of the background sweep that closes past-deadline auctions.
    pub close_sweep_interval_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let amount_scale = env_map
            .get("AMOUNT_SCALE")
            .map(|s| s.as_str())
            .unwrap_or("2")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "AMOUNT_SCALE".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        let lock_wait_ms = env_map
            .get("LOCK_WAIT_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "LOCK_WAIT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let lock_retries = env_map
            .get("LOCK_RETRIES")
            .map(|s| s.as_str())
            .unwrap_or("2")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "LOCK_RETRIES".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        let close_sweep_interval_ms = env_map
            .get("CLOSE_SWEEP_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("1000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "CLOSE_SWEEP_INTERVAL_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            amount_scale,
            lock_wait_ms,
            lock_retries,
            close_sweep_interval_ms,
        })
    }
}
