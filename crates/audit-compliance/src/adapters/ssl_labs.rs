//! SSL Labs TLS assessment client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{AdapterError, RawOutput, ScannerAdapter};
use crate::catalog::ToolKind;
use crate::pipeline::duration_secs;

/// `[adapters.ssl_labs]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SslLabsConfig {
    /// Register the adapter
    pub enabled: bool,
    /// `analyze` endpoint
    pub endpoint: String,
    /// Polls before giving up on an assessment still in progress
    pub max_polls: u32,
    /// Pause between polls, in seconds
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Timeout for each HTTP request, in seconds
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for SslLabsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.ssllabs.com/api/v3/analyze".into(),
            max_polls: 60,
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SslLabsConfig {
    /// Time spent waiting between polls when the assessment never completes.
    /// Fresh assessments routinely take several minutes.
    pub fn polling_budget(&self) -> Duration {
        self.poll_interval * self.max_polls.saturating_sub(1)
    }
}

/// Polls the SSL Labs API until the assessment is READY or ERROR
pub struct SslLabsAdapter {
    config: SslLabsConfig,
    client: reqwest::Client,
}

impl SslLabsAdapter {
    /// Build the HTTP client
    pub fn new(config: SslLabsConfig) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Failed(format!("SSL Labs client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn poll(&self, host: &str) -> Result<Value, AdapterError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("host", host), ("all", "done")])
            .send()
            .await
            .map_err(|e| AdapterError::Failed(format!("SSL Labs request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AdapterError::Failed(format!(
                "SSL Labs returned HTTP {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(format!("SSL Labs response: {}", e)))
    }
}

#[async_trait]
impl ScannerAdapter for SslLabsAdapter {
    fn tool(&self) -> ToolKind {
        ToolKind::Ssl
    }

    fn name(&self) -> &str {
        "ssl-labs"
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        let host = url::Url::parse(target)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| AdapterError::Failed(format!("no host in {}", target)))?;

        for attempt in 1..=self.config.max_polls {
            let body = self.poll(&host).await?;
            match body.get("status").and_then(Value::as_str) {
                Some("READY") => return Ok(RawOutput::Json(body)),
                Some("ERROR") => {
                    let message = body
                        .get("statusMessage")
                        .and_then(Value::as_str)
                        .unwrap_or("assessment failed");
                    return Err(AdapterError::Failed(format!("SSL Labs: {}", message)));
                }
                status => {
                    debug!(
                        "SSL Labs assessment for {} is {:?} (poll {}/{})",
                        host, status, attempt, self.config.max_polls
                    );
                }
            }
            if attempt < self.config.max_polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(AdapterError::Failed(format!(
            "SSL Labs assessment for {} not ready after {} polls",
            host, self.config.max_polls
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    #[test]
    fn test_default_polling_fits_pipeline_timeout() {
        let config = SslLabsConfig::default();
        let pipeline = PipelineConfig::default();
        let budget = config.polling_budget();

        assert!(budget >= Duration::from_secs(5 * 60));
        assert!(budget + config.request_timeout <= pipeline.timeout_for(ToolKind::Ssl));
    }

    #[test]
    fn test_zero_polls_has_no_budget() {
        let config = SslLabsConfig {
            max_polls: 0,
            ..SslLabsConfig::default()
        };
        assert_eq!(config.polling_budget(), Duration::ZERO);
    }
}
