use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::MechshareError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub db_max_connections: u32,

    // Web server
    pub web_host: String,
    pub web_port: u16,
    pub allowed_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,
    pub jwt_issuer: String,

    // Interaction tracking
    pub dedup_window: Duration,
    pub max_batch_ids: usize,

    // Files
    pub upload_dir: String,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, MechshareError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MechshareError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MechshareError::Config(format!("{key} environment variable is required")))
        };

        let dedup_window_secs: u64 = parse_or(&lookup, "DEDUP_WINDOW_SECS", 300)?;
        if dedup_window_secs == 0 {
            return Err(MechshareError::Config(
                "DEDUP_WINDOW_SECS must be greater than zero".to_string(),
            ));
        }

        let max_batch_ids: usize = parse_or(&lookup, "MAX_BATCH_IDS", 100)?;
        if max_batch_ids == 0 {
            return Err(MechshareError::Config(
                "MAX_BATCH_IDS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: parse_or(&lookup, "WEB_PORT", 8000)?,
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "mechshare".to_string()),
            dedup_window: Duration::from_secs(dedup_window_secs),
            max_batch_ids,
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, MechshareError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| MechshareError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
