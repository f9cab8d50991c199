use std::{env, str::FromStr};

use crate::pricing::PricingConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Per-connection statement timeout; a checkout blocked behind another
    /// writer fails instead of hanging.
    pub statement_timeout_ms: u64,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed_or("APP_PORT", 3000),
            statement_timeout_ms: parsed_or("DB_STATEMENT_TIMEOUT_MS", 5_000),
            pricing: PricingConfig {
                shipping_flat_cost: parsed_or("SHIPPING_FLAT_COST", 15_000),
                tax_rate_bps: parsed_or("TAX_RATE_BPS", 1_000),
            },
        })
    }
}

/// Numeric env var with a fallback; unset and unparseable both take the
/// fallback.
fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
