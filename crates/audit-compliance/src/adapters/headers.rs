//! HTTP security header fetcher

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{AdapterError, RawOutput, ScannerAdapter};
use crate::catalog::ToolKind;
use crate::pipeline::duration_secs;

/// `[adapters.headers]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Register the adapter
    pub enabled: bool,
    /// Redirects followed before giving up
    pub max_redirects: usize,
    /// Seconds
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_redirects: 10,
            request_timeout: Duration::from_secs(15),
            user_agent: "autoaudit/0.1".into(),
        }
    }
}

/// Issues a HEAD request (following redirects) and reports the final headers
pub struct HeadersAdapter {
    client: reqwest::Client,
}

impl HeadersAdapter {
    /// Build the HTTP client
    pub fn new(config: HeadersConfig) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| AdapterError::Failed(format!("header client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScannerAdapter for HeadersAdapter {
    fn tool(&self) -> ToolKind {
        ToolKind::Headers
    }

    fn name(&self) -> &str {
        "curl-headers"
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        let response = self
            .client
            .head(target)
            .send()
            .await
            .map_err(|e| AdapterError::Failed(format!("header fetch failed: {}", e)))?;

        let mut headers = Map::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers.insert(name.as_str().to_ascii_lowercase(), Value::String(value));
        }

        Ok(RawOutput::Json(json!({
            "url": response.url().as_str(),
            "status": response.status().as_u16(),
            "headers": headers,
        })))
    }
}
