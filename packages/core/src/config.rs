use std::env;
use std::time::Duration;

use crate::cli::Cli;
use crate::services::myturn::{ApiKey, DEFAULT_BASE_URL};
use crate::services::retry::RetryPolicy;

const DEFAULT_API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_MAX_RESTARTS: u32 = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub poll_interval_seconds: u64,
    pub max_retries: u32,
    pub max_restarts: u32,
    pub zip_table_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Every setting has a default
    /// except the optional API key and zip table.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let base_url = lookup("MYTURN_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(format!("Invalid MYTURN_BASE_URL: {}", base_url));
        }

        let api_key = lookup("MYTURN_API_KEY").filter(|key| !key.is_empty());
        let api_key_header =
            lookup("MYTURN_API_KEY_HEADER").unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());

        let poll_interval_seconds = parse_or(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?;
        if poll_interval_seconds == 0 {
            return Err("POLL_INTERVAL_SECONDS must be greater than zero".to_string());
        }

        let max_retries = parse_or(&lookup, "MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let max_restarts = parse_or(&lookup, "MAX_RESTARTS", DEFAULT_MAX_RESTARTS)?;
        let zip_table_path = lookup("ZIP_TABLE_PATH");

        Ok(Self {
            base_url,
            api_key,
            api_key_header,
            poll_interval_seconds,
            max_retries,
            max_restarts,
            zip_table_path,
        })
    }

    /// Command-line flags take precedence over the environment.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(poll_interval) = cli.poll_interval {
            self.poll_interval_seconds = poll_interval.max(1);
        }
        if let Some(zip_table) = &cli.zip_table {
            self.zip_table_path = Some(zip_table.clone());
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }

    pub fn api_key(&self) -> Option<ApiKey> {
        self.api_key.as_ref().map(|value| ApiKey {
            header: self.api_key_header.clone(),
            value: value.clone(),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
