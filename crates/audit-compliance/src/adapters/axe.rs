//! axe-core CLI runner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::{AdapterError, RawOutput, ScannerAdapter};
use crate::catalog::ToolKind;

/// `[adapters.axe]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AxeConfig {
    /// Register the adapter
    pub enabled: bool,
    /// Program to launch
    pub command: String,
    /// Arguments before the target URL
    pub args: Vec<String>,
}

impl Default for AxeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "npx".into(),
            args: ["--yes", "--package", "@axe-core/cli", "axe", "--stdout"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Runs `axe --stdout <url>` and keeps the last JSON document it prints
pub struct AxeAdapter {
    config: AxeConfig,
}

impl AxeAdapter {
    /// Wrap a config; the CLI is only spawned on `run_scan`
    pub fn new(config: AxeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScannerAdapter for AxeAdapter {
    fn tool(&self) -> ToolKind {
        ToolKind::Axe
    }

    fn name(&self) -> &str {
        "axe-core"
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        debug!("Running {} {:?} {}", self.config.command, self.config.args, target);
        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AdapterError::Failed(format!("failed to start axe: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match extract_last_json(&stdout) {
            Some(value) => Ok(RawOutput::Json(value)),
            None if !output.status.success() => Err(AdapterError::Failed(format!(
                "axe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            None => Err(AdapterError::Malformed("axe printed no JSON output".into())),
        }
    }
}

/// Last complete JSON array or object in noisy CLI output
pub fn extract_last_json(text: &str) -> Option<Value> {
    let mut last = None;
    let mut consumed = 0;
    for (start, ch) in text.char_indices() {
        if start < consumed || !(ch == '{' || ch == '[') {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            consumed = start + stream.byte_offset();
            last = Some(value);
        }
    }
    last
}
