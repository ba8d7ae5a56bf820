use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub struct Config {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_cache: PathBuf,
    pub token_ttl_days: i64,
}

impl Config {
    /// Read the environment (after `.env` has been loaded). Command-line
    /// flags are applied on top by the caller.
    pub fn load() -> Result<Self> {
        let jwt_secret = var("DEVHUB_JWT_SECRET").unwrap_or_else(|| {
            warn!("DEVHUB_JWT_SECRET not set, using the development secret");
            "dev-secret-change-me".into()
        });

        Ok(Self {
            db_path: try_load("DEVHUB_DB_PATH", "devhub.db")?,
            jwt_secret,
            session_cache: try_load("DEVHUB_SESSION_CACHE", ".devhub-session.json")?,
            token_ttl_days: try_load("DEVHUB_TOKEN_TTL_DAYS", "30")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value '{raw}'"))
}
