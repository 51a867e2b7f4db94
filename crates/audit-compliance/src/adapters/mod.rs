//! Scanner Adapters
//!
//! Thin wrappers around the external tools. Each returns the tool's raw
//! output; normalization happens in the ingestors.

/// axe-core CLI
pub mod axe;
/// HTTP response headers
pub mod headers;
/// Nikto web server scanner
pub mod nikto;
/// Privacy policy analysis service
pub mod policy;
/// SSL Labs API
pub mod ssl_labs;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::{TestRef, ToolKind};

pub use axe::{AxeAdapter, AxeConfig};
pub use headers::{HeadersAdapter, HeadersConfig};
pub use nikto::{NiktoAdapter, NiktoConfig};
pub use policy::{PolicyAdapter, PolicyConfig};
pub use ssl_labs::{SslLabsAdapter, SslLabsConfig};

/// Raw adapter payload
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// Structured tool report
    Json(Value),
    /// Plain stdout, parsed as JSON when possible
    Text(String),
}

impl RawOutput {
    /// JSON view of the payload. Text that is not JSON becomes `{"raw": text}`.
    pub fn into_value(self) -> Value {
        match self {
            RawOutput::Json(value) => value,
            RawOutput::Text(text) => serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "raw": text })),
        }
    }
}

/// Adapter failure. The message surfaces verbatim as the ERROR reason.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The tool could not be run or reported an error
    #[error("{0}")]
    Failed(String),

    /// The call exceeded its time budget (seconds)
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The tool answered with something unreadable
    #[error("{0}")]
    Malformed(String),
}

/// External scanner
#[async_trait]
pub trait ScannerAdapter: Send + Sync {
    /// Tool family this adapter reports for
    fn tool(&self) -> ToolKind;

    /// Display name, used in logs and as the ToolRun key
    fn name(&self) -> &str;

    /// Test this adapter reports under. Failures of the adapter turn that
    /// Test into ERROR without touching Tests owned by sibling adapters.
    fn test_ref(&self) -> TestRef {
        TestRef::ToolDefault
    }

    /// Run the tool once against an absolute URL
    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError>;
}

/// `[adapters.*]` configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// `[adapters.ssl_labs]`
    pub ssl_labs: SslLabsConfig,
    /// `[adapters.headers]`
    pub headers: HeadersConfig,
    /// `[adapters.axe]`
    pub axe: AxeConfig,
    /// `[adapters.nikto]`
    pub nikto: NiktoConfig,
    /// `[adapters.policy]`
    pub policy: PolicyConfig,
}

/// Build every enabled reference adapter
pub fn build_adapters(settings: &AdapterSettings) -> Result<Vec<Arc<dyn ScannerAdapter>>, AdapterError> {
    let mut adapters: Vec<Arc<dyn ScannerAdapter>> = Vec::new();
    if settings.ssl_labs.enabled {
        adapters.push(Arc::new(SslLabsAdapter::new(settings.ssl_labs.clone())?));
    }
    if settings.headers.enabled {
        adapters.push(Arc::new(HeadersAdapter::new(settings.headers.clone())?));
    }
    if settings.axe.enabled {
        adapters.push(Arc::new(AxeAdapter::new(settings.axe.clone())));
    }
    if settings.nikto.enabled {
        adapters.push(Arc::new(NiktoAdapter::new(settings.nikto.clone())));
    }
    if settings.policy.enabled {
        match PolicyAdapter::new(settings.policy.clone())? {
            Some(adapter) => adapters.push(Arc::new(adapter)),
            None => tracing::warn!("Policy analyzer enabled without an endpoint, skipping"),
        }
    }
    Ok(adapters)
}
