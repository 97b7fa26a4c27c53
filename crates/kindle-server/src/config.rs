use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const MIN_FRESHNESS_SECS: u64 = 30;
const MAX_FRESHNESS_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub jwt_secret: String,
    pub freshness_window: Duration,
    pub max_file_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("KINDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("KINDLE_JWT_SECRET is unset or still a placeholder; it must match the identity service's secret");
        }

        let port: u16 = get("KINDLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("KINDLE_PORT")?;

        let requested: u64 = get("KINDLE_FRESHNESS_SECS")
            .unwrap_or_else(|| "45".into())
            .parse()
            .context("KINDLE_FRESHNESS_SECS")?;
        let freshness = requested.clamp(MIN_FRESHNESS_SECS, MAX_FRESHNESS_SECS);
        if freshness != requested {
            warn!(
                "KINDLE_FRESHNESS_SECS={} outside {}..={}, using {}",
                requested, MIN_FRESHNESS_SECS, MAX_FRESHNESS_SECS, freshness
            );
        }

        let max_file_bytes: usize = get("KINDLE_MAX_FILE_BYTES")
            .unwrap_or_else(|| (50 * 1024 * 1024).to_string())
            .parse()
            .context("KINDLE_MAX_FILE_BYTES")?;

        Ok(Self {
            host: get("KINDLE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("KINDLE_DB_PATH").unwrap_or_else(|| "kindle.db".into()).into(),
            storage_dir: get("KINDLE_STORAGE_DIR").unwrap_or_else(|| "./objects".into()).into(),
            jwt_secret,
            freshness_window: Duration::from_secs(freshness),
            max_file_bytes,
        })
    }
}
