//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is honoured via `dotenvy`; real
//! environment variables take precedence over it.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::FixedOffset;
use sea_orm::ConnectOptions;
use thiserror::Error;

use crate::gate::{PinPolicy, PinPolicyError, DEFAULT_PIN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("ADMIN_PIN_SHA256 is invalid: {0}")]
    PinHash(#[from] PinPolicyError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub pin_policy: PinPolicy,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub secure_cookies: bool,
    /// Period of the expired-session sweep. Never zero.
    pub session_cleanup_interval: Duration,
    /// Offset used whenever a timestamp is shown to a person.
    pub display_offset: FixedOffset,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;

        let pin_policy = match (lookup("ADMIN_PIN_SHA256"), lookup("ADMIN_PIN")) {
            (Some(digest), _) => PinPolicy::from_sha256_hex(&digest)?,
            (None, Some(pin)) => PinPolicy::Plain(pin),
            (None, None) => PinPolicy::Plain(DEFAULT_PIN.to_string()),
        };

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10u32)?;
        let min_connections = parse_or(&lookup, "DB_MIN_CONNECTIONS", 2u32)?;
        let connect_timeout = Duration::from_secs(parse_or(&lookup, "DB_CONNECT_TIMEOUT_SECS", 10u64)?);
        let secure_cookies = parse_or(&lookup, "SECURE_COOKIES", false)?;

        let cleanup_secs: u64 = parse_or(&lookup, "SESSION_CLEANUP_INTERVAL_SECS", 300)?;
        if cleanup_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_CLEANUP_INTERVAL_SECS",
                value: cleanup_secs.to_string(),
            });
        }
        let session_cleanup_interval = Duration::from_secs(cleanup_secs);

        let offset_minutes: i32 = parse_or(&lookup, "DISPLAY_UTC_OFFSET_MINUTES", 0)?;
        let display_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                name: "DISPLAY_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
            })?;

        Ok(Self {
            database_url,
            bind_addr,
            pin_policy,
            max_connections,
            min_connections,
            connect_timeout,
            secure_cookies,
            session_cleanup_interval,
            display_offset,
        })
    }

    /// Sea-ORM connection options for [`database_url`](Self::database_url).
    pub fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.database_url.clone());
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.connect_timeout)
            .sqlx_logging(false);
        opt
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
