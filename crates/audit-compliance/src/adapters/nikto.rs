//! Nikto runner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AdapterError, RawOutput, ScannerAdapter};
use crate::catalog::ToolKind;

/// `[adapters.nikto]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NiktoConfig {
    /// Register the adapter
    pub enabled: bool,
    /// nikto executable
    pub binary: String,
    /// Seconds nikto may spend on the whole host
    pub max_time: u64,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    /// Value of `-Tuning`
    pub tuning: String,
}

impl Default for NiktoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "nikto".into(),
            max_time: 30,
            request_timeout: 5,
            tuning: "b".into(),
        }
    }
}

/// Runs nikto with JSON output to a temp file, falling back to stdout text
pub struct NiktoAdapter {
    config: NiktoConfig,
}

impl NiktoAdapter {
    /// Wrap a config; nikto is only spawned on `run_scan`
    pub fn new(config: NiktoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScannerAdapter for NiktoAdapter {
    fn tool(&self) -> ToolKind {
        ToolKind::Nikto
    }

    fn name(&self) -> &str {
        "nikto"
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        let output_file = std::env::temp_dir().join(format!("nikto-{}.json", Uuid::new_v4()));

        let output = Command::new(&self.config.binary)
            .arg("-h")
            .arg(target)
            .arg("-nointeractive")
            .arg("-maxtime")
            .arg(format!("{}s", self.config.max_time))
            .arg("-timeout")
            .arg(self.config.request_timeout.to_string())
            .arg("-Tuning")
            .arg(&self.config.tuning)
            .args(["-Format", "json", "-output"])
            .arg(&output_file)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AdapterError::Failed(format!("failed to start nikto: {}", e)))?;

        let report = tokio::fs::read_to_string(&output_file).await.ok();
        if let Err(e) = tokio::fs::remove_file(&output_file).await {
            debug!("Nikto output file {} not removed: {}", output_file.display(), e);
        }

        if let Some(json) = report.and_then(|raw| serde_json::from_str(&raw).ok()) {
            return Ok(RawOutput::Json(json));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(AdapterError::Failed(format!(
                "nikto exited with {} and produced no output: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        warn!("Nikto JSON report unavailable, falling back to text output");
        Ok(RawOutput::Text(stdout))
    }
}
