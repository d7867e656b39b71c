use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Named deployment of the underwriting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "DEV")]
    Dev,
    #[serde(rename = "RATING_PROD")]
    RatingProd,
}

impl Environment {
    /// Selects the production rating environment when `prod` is set, DEV otherwise.
    pub fn from_prod_flag(prod: bool) -> Self {
        if prod {
            Environment::RatingProd
        } else {
            Environment::Dev
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::RatingProd => "RATING_PROD",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dev_base_url: String,
    pub rating_prod_base_url: String,
    pub control_url: String,
    pub request_timeout_secs: u64,
    pub startup_timeout_secs: u64,
    pub health_poll_interval_ms: u64,
}

fn required_http_url(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", var))
        .and_then(|url| {
            if url.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", var);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", var);
            }
            Ok(url.trim_end_matches('/').to_string())
        })
}

fn positive_number(var: &str, default: u64) -> anyhow::Result<u64> {
    let value: u64 = std::env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid positive number", var))?;
    if value == 0 {
        anyhow::bail!("{} must be greater than zero", var);
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            dev_base_url: required_http_url("UW_DEV_BASE_URL")?,
            rating_prod_base_url: required_http_url("UW_RATING_PROD_BASE_URL")?,
            control_url: required_http_url("UW_CONTROL_URL")?,
            request_timeout_secs: positive_number("UW_REQUEST_TIMEOUT_SECS", 30)?,
            startup_timeout_secs: positive_number("UW_STARTUP_TIMEOUT_SECS", 120)?,
            health_poll_interval_ms: positive_number("UW_HEALTH_POLL_INTERVAL_MS", 2000)?,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("DEV base URL: {}", config.dev_base_url);
        tracing::debug!("RATING_PROD base URL: {}", config.rating_prod_base_url);
        tracing::debug!("Control URL: {}", config.control_url);
        tracing::debug!(
            "Timeouts: request={}s startup={}s poll={}ms",
            config.request_timeout_secs,
            config.startup_timeout_secs,
            config.health_poll_interval_ms
        );

        Ok(config)
    }

    /// Base URL of the underwriting service for the given environment.
    pub fn base_url_for(&self, env: Environment) -> &str {
        match env {
            Environment::Dev => &self.dev_base_url,
            Environment::RatingProd => &self.rating_prod_base_url,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }
}
