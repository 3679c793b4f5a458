use std::{env, net::SocketAddr, time::Duration};

use anyhow::Context;
use chrono_tz::Tz;

use crate::{
    lichess::DEFAULT_API_BASE_URL,
    types::{parse_time_of_day, parse_timezone},
};

pub const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";
pub const DEFAULT_DAILY_STATS_TIME: &str = "22:00";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_bind: SocketAddr,
    pub discord_token: Option<String>,
    pub lichess_api_base_url: String,
    pub lichess_timeout: Duration,
    pub timezone: Tz,
    /// Used until a time is stored through `/set_time` or the API.
    pub daily_stats_time: String,
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_owned());
        let http_bind = env::var("HTTP_BIND").unwrap_or_else(|_| format!("0.0.0.0:{port}"));
        let http_bind = http_bind
            .parse()
            .with_context(|| format!("invalid HTTP_BIND address {http_bind}"))?;

        let timezone = parse_timezone(
            &env::var("TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_owned()),
        )?;

        let daily_stats_time =
            env::var("DAILY_STATS_TIME").unwrap_or_else(|_| DEFAULT_DAILY_STATS_TIME.to_owned());
        parse_time_of_day(&daily_stats_time)?;

        Ok(Self {
            http_bind,
            discord_token: env_non_empty("DISCORD_TOKEN"),
            lichess_api_base_url: env_non_empty("LICHESS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()),
            lichess_timeout: Duration::from_secs(env_u64("LICHESS_TIMEOUT_SEC", 15)),
            timezone,
            daily_stats_time: daily_stats_time.trim().to_owned(),
            database_url: env_non_empty("DATABASE_URL"),
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
