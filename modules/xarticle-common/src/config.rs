use std::env;
use std::str::FromStr;

use tracing::info;

use crate::error::XarticleError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // RapidAPI
    pub rapidapi_key: String,
    pub rapidapi_host: String,
    pub twitter_timeout_ms: u64,
    pub twitter_request_interval_ms: u64,

    // Ingestion pacing
    pub request_delay_ms: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_list_pages: u32,
}

impl Config {
    /// Load the full ingestion config. RapidAPI and Postgres settings are required.
    pub fn from_env() -> Result<Self, XarticleError> {
        Self::from_lookup(|key| env::var(key).ok(), true)
    }

    /// Load a config for store-only commands (migrations, list management,
    /// URL expansion). The RapidAPI key may be absent.
    pub fn store_from_env() -> Result<Self, XarticleError> {
        Self::from_lookup(|key| env::var(key).ok(), false)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        need_rapidapi: bool,
    ) -> Result<Self, XarticleError> {
        let rapidapi_key = if need_rapidapi {
            required(&lookup, "RAPIDAPI_KEY")?
        } else {
            lookup("RAPIDAPI_KEY").unwrap_or_default()
        };

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            rapidapi_key,
            rapidapi_host: lookup("RAPIDAPI_HOST")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "twitter241.p.rapidapi.com".to_string()),
            twitter_timeout_ms: parsed_or(&lookup, "TWITTER_TIMEOUT_MS", 15_000)?,
            twitter_request_interval_ms: parsed_or(&lookup, "TWITTER_REQUEST_INTERVAL_MS", 100)?,
            request_delay_ms: parsed_or(&lookup, "INGEST_REQUEST_DELAY_MS", 1_000)?,
            batch_size: parsed_or(&lookup, "INGEST_BATCH_SIZE", 10)?,
            batch_delay_ms: parsed_or(&lookup, "INGEST_BATCH_DELAY_MS", 1_000)?,
            max_list_pages: parsed_or(&lookup, "INGEST_MAX_LIST_PAGES", 3)?,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            database = %redact_url(&self.database_url),
            rapidapi_host = %self.rapidapi_host,
            rapidapi_key_set = !self.rapidapi_key.is_empty(),
            twitter_timeout_ms = self.twitter_timeout_ms,
            twitter_request_interval_ms = self.twitter_request_interval_ms,
            request_delay_ms = self.request_delay_ms,
            batch_size = self.batch_size,
            batch_delay_ms = self.batch_delay_ms,
            max_list_pages = self.max_list_pages,
            "Loaded configuration"
        );
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, XarticleError> {
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| XarticleError::Config(format!("{key} environment variable is required")))
}

fn parsed_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, XarticleError> {
    match lookup(key).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| XarticleError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}

/// Drop the userinfo part of a connection URL.
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("***");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}
