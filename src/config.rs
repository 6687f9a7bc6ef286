//! Runtime configuration loaded from the environment.

use rust_decimal::Decimal;
use sea_orm::DatabaseBackend;
use std::str::FromStr;
use std::time::Duration;

use crate::services::transaction_store::AggregationMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// How the Transaction Store aggregation strategy is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Pushdown on Postgres, in-memory elsewhere
    Auto,
    Fixed(AggregationMode),
}

impl SegmentationMode {
    pub fn resolve(self, backend: DatabaseBackend) -> AggregationMode {
        match self {
            SegmentationMode::Auto => AggregationMode::for_backend(backend),
            SegmentationMode::Fixed(mode) => mode,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub processor_base_url: String,
    pub processor_timeout: Duration,
    pub processor_max_retries: u32,
    pub sync_max_pages: u32,
    /// Zero disables the background job
    pub sync_interval_secs: u64,
    pub payment_callback_url: String,
    pub subscription_amount_minor: i64,
    pub high_value_threshold: Decimal,
    pub segmentation_mode: SegmentationMode,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let segmentation_mode = match get("SEGMENTATION_MODE").as_deref() {
            None | Some("auto") => SegmentationMode::Auto,
            Some("in_memory") => SegmentationMode::Fixed(AggregationMode::InMemory),
            Some("pushdown") => SegmentationMode::Fixed(AggregationMode::Pushdown),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SEGMENTATION_MODE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            processor_base_url: get("PROCESSOR_BASE_URL")
                .unwrap_or_else(|| "https://api.paystack.co".to_string())
                .trim_end_matches('/')
                .to_string(),
            processor_timeout: Duration::from_secs(parse_or(
                &get,
                "PROCESSOR_TIMEOUT_SECS",
                30,
            )?),
            processor_max_retries: parse_or(&get, "PROCESSOR_MAX_RETRIES", 3)?,
            sync_max_pages: parse_or(&get, "SYNC_MAX_PAGES", 50)?,
            sync_interval_secs: parse_or(&get, "SYNC_INTERVAL_SECS", 21600)?,
            payment_callback_url: get("PAYMENT_CALLBACK_URL").unwrap_or_default(),
            subscription_amount_minor: parse_or(&get, "SUBSCRIPTION_AMOUNT_MINOR", 10_000)?,
            high_value_threshold: parse_or(&get, "HIGH_VALUE_THRESHOLD", Decimal::from(500))?,
            segmentation_mode,
            sendgrid_api_key: get("SENDGRID_API_KEY"),
            sendgrid_from_email: get("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|| "no-reply@localhost".to_string()),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
