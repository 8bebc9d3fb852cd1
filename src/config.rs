use std::time::Duration;

use dotenvy::var;
use eyre::{Result, WrapErr};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_pool_size: u32,
    pub reminder_poll: Duration,
    pub expo_push_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = var("DATABASE_URL").wrap_err("DATABASE_URL must be set")?;
        let bind_addr = var("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.to_string());
        let db_pool_size = parse_or("DB_POOL_SIZE", 10)?;
        let poll_secs: u64 = parse_or("REMINDER_POLL_SECS", 60)?;
        let expo_push_url = var("EXPO_PUSH_URL").unwrap_or(DEFAULT_EXPO_PUSH_URL.to_string());
        Ok(Config {
            database_url,
            bind_addr,
            db_pool_size,
            reminder_poll: Duration::from_secs(poll_secs.max(1)),
            expo_push_url,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Ok(raw) => raw.trim().parse().wrap_err_with(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
