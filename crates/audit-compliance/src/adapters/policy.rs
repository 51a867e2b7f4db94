//! Privacy policy analyzer client
//!
//! Posts the target to an external headless-browser service and returns its
//! cookie and policy observations as JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{AdapterError, RawOutput, ScannerAdapter};
use crate::catalog::{TestRef, ToolKind};
use crate::pipeline::duration_secs;

/// `[adapters.policy]`, disabled unless an endpoint is set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Register the adapter
    pub enabled: bool,
    /// Analysis service URL
    pub endpoint: Option<String>,
    /// Seconds
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Posts the target to a privacy policy analysis service
pub struct PolicyAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl PolicyAdapter {
    /// `None` when no endpoint is configured
    pub fn new(config: PolicyConfig) -> Result<Option<Self>, AdapterError> {
        let Some(endpoint) = config.endpoint else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Failed(format!("policy client: {}", e)))?;
        Ok(Some(Self { endpoint, client }))
    }
}

#[async_trait]
impl ScannerAdapter for PolicyAdapter {
    fn tool(&self) -> ToolKind {
        ToolKind::Cookies
    }

    fn name(&self) -> &str {
        "privacy-policy"
    }

    fn test_ref(&self) -> TestRef {
        TestRef::PolicyCheck("privacy-policy".into())
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "url": target }))
            .send()
            .await
            .map_err(|e| AdapterError::Failed(format!("policy analyzer request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AdapterError::Failed(format!(
                "policy analyzer returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(format!("policy analyzer response: {}", e)))?;

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(AdapterError::Failed(error.to_string()));
        }
        Ok(RawOutput::Json(body))
    }
}
