use std::env;

use anyhow::Context;
use chrono_tz::Tz;

use crate::scheduling::timegrid::DEFAULT_TIMEZONE;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub default_timezone: Tz,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let tz_name = env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let default_timezone = tz_name
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("DEFAULT_TIMEZONE is not an IANA zone: {tz_name}"))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            bind_addr,
            default_timezone,
            db_max_connections,
            run_migrations,
        })
    }
}
