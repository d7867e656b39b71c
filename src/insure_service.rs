//! Managed underwriting service: lifecycle control and endpoint calls.
//!
//! The engine only talks to [`InsureService`]. [`HttpInsureService`] is the
//! HTTP implementation: the service answers on `{base_url}/{endpoint}` and is
//! started and stopped through a control plane at
//! `{control_url}/services/{ENV}/start|stop`.

use crate::config::{Config, Environment};
use crate::errors::{ResultExt, UnderwritingError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Raw answer of an endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: String,
}

impl EndpointResponse {
    /// Decodes the body as JSON.
    pub fn json(&self) -> Result<Value, UnderwritingError> {
        serde_json::from_str(&self.body).map_err(|e| {
            UnderwritingError::ExternalApiError(format!(
                "Failed to parse response body as JSON: {}",
                e
            ))
        })
    }
}

/// A remote service whose lifetime can be managed by the caller.
#[async_trait]
pub trait InsureService: Send + Sync {
    fn environment(&self) -> Environment;

    /// Whether the service currently answers its health check.
    async fn is_up(&self) -> Result<bool, UnderwritingError>;

    /// Starts the service and returns once it is healthy.
    async fn start(&self) -> Result<(), UnderwritingError>;

    async fn stop(&self) -> Result<(), UnderwritingError>;

    /// Posts `body` to the named endpoint with the given headers.
    async fn call_endpoint(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<EndpointResponse, UnderwritingError>;
}

#[derive(Clone)]
pub struct HttpInsureService {
    client: reqwest::Client,
    environment: Environment,
    base_url: String,
    control_url: String,
    startup_timeout: Duration,
    poll_interval: Duration,
}

impl HttpInsureService {
    /// Creates a service handle for `environment` from the loaded configuration.
    pub fn new(config: &Config, environment: Environment) -> Result<Self, UnderwritingError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                UnderwritingError::Configuration(format!(
                    "Failed to create underwriting HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            environment,
            base_url: config.base_url_for(environment).to_string(),
            control_url: config.control_url.clone(),
            startup_timeout: config.startup_timeout(),
            poll_interval: config.health_poll_interval(),
        })
    }

    fn control_endpoint(&self, action: &str) -> String {
        format!(
            "{}/services/{}/{}",
            self.control_url,
            self.environment.as_str(),
            action
        )
    }

    async fn control(&self, action: &str) -> Result<reqwest::Response, UnderwritingError> {
        let url = self.control_endpoint(action);
        tracing::debug!("Control request: POST {}", url);

        self.client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("{} request for {} failed", action, self.environment))
    }

    async fn wait_until_up(&self) -> Result<(), UnderwritingError> {
        let poll = async {
            loop {
                if self.is_up().await? {
                    return Ok::<(), UnderwritingError>(());
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.startup_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(UnderwritingError::ServiceUnavailable(format!(
                "{} did not become healthy within {}s",
                self.environment,
                self.startup_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl InsureService for HttpInsureService {
    fn environment(&self) -> Environment {
        self.environment
    }

    async fn is_up(&self) -> Result<bool, UnderwritingError> {
        let url = format!("{}/health", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            // An unreachable service is simply not up.
            Err(e) if e.is_connect() || e.is_timeout() => {
                tracing::debug!("Health check for {} failed: {}", self.environment, e);
                Ok(false)
            }
            Err(e) => Err(UnderwritingError::from(e)),
        }
    }

    async fn start(&self) -> Result<(), UnderwritingError> {
        tracing::info!("Starting underwriting service in {}", self.environment);

        let response = self.control("start").await.map_err(|e| {
            UnderwritingError::ServiceUnavailable(format!("Failed to start service: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Service start returned {}: {}", status, error_text);
            return Err(UnderwritingError::ServiceUnavailable(format!(
                "Service start returned {}: {}",
                status, error_text
            )));
        }

        self.wait_until_up().await?;
        tracing::info!("✓ Underwriting service up in {}", self.environment);
        Ok(())
    }

    async fn stop(&self) -> Result<(), UnderwritingError> {
        tracing::info!("Stopping underwriting service in {}", self.environment);

        let response = self.control("stop").await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UnderwritingError::ExternalApiError(format!(
                "Service stop returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }

    async fn call_endpoint(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<EndpointResponse, UnderwritingError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let mut request = self.client.post(&url).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to endpoint '{}' failed", endpoint))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body from endpoint '{}'", endpoint))?;

        Ok(EndpointResponse { status, body })
    }
}
