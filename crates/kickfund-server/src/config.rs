use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use kickfund_types::models::StatsPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub token_ttl_hours: i64,
    pub stats_policy: StatsPolicy,
    pub payment_base_url: Option<String>,
    pub max_upload_mb: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("KICKFUND_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("KICKFUND_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port: u16 = var("KICKFUND_PORT", "3000")
            .parse()
            .context("KICKFUND_PORT must be a port number")?;
        let token_ttl_hours: i64 = var("KICKFUND_TOKEN_TTL_HOURS", "72")
            .parse()
            .context("KICKFUND_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            bail!(
                "KICKFUND_TOKEN_TTL_HOURS must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            );
        }
        let stats_policy: StatsPolicy = var("KICKFUND_STATS_POLICY", "all")
            .parse()
            .map_err(anyhow::Error::msg)
            .context("KICKFUND_STATS_POLICY")?;
        let max_upload_mb: usize = var("KICKFUND_MAX_UPLOAD_MB", "10")
            .parse()
            .context("KICKFUND_MAX_UPLOAD_MB must be a whole number")?;

        Ok(Self {
            jwt_secret,
            db_path: var("KICKFUND_DB_PATH", "kickfund.db").into(),
            host: var("KICKFUND_HOST", "0.0.0.0"),
            port,
            storage_dir: var("KICKFUND_STORAGE_DIR", "./images").into(),
            token_ttl_hours,
            stats_policy,
            payment_base_url: lookup("KICKFUND_PAYMENT_BASE_URL"),
            max_upload_mb,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
