//! Scan sessions

use audit_graph::{GraphStore, Scan, UpsertOutcome};
use chrono::Utc;
use tracing::info;
use url::Url;

use crate::ComplianceError;

/// Normalize user input into an absolute http(s) URL.
///
/// Surrounding whitespace and quotes are dropped and `https://` is assumed
/// when no scheme is given.
pub fn normalize_target(input: &str) -> Result<String, ComplianceError> {
    let trimmed = input
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if trimmed.is_empty() {
        return Err(ComplianceError::InvalidTarget("target is empty".into()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ComplianceError::InvalidTarget(format!("{}: {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ComplianceError::InvalidTarget(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url.to_string()),
        _ => Err(ComplianceError::InvalidTarget(format!("{} has no host", trimmed))),
    }
}

/// Validate the target and create a new Scan
pub async fn start_scan(store: &dyn GraphStore, target: &str) -> Result<Scan, ComplianceError> {
    let target = normalize_target(target)?;
    let (scan, _) = store.upsert_scan(Scan::new(target)).await?;
    info!("Started scan {} for {}", scan.id, scan.target);
    Ok(scan)
}

/// Create the Scan with a caller-chosen id, or reuse it when it already exists
pub async fn start_scan_with_id(
    store: &dyn GraphStore,
    scan_id: &str,
    target: &str,
) -> Result<Scan, ComplianceError> {
    let target = normalize_target(target)?;
    let (scan, outcome) = store
        .upsert_scan(Scan {
            id: scan_id.to_string(),
            target,
            created_at: Utc::now(),
        })
        .await?;
    if outcome == UpsertOutcome::Refreshed {
        info!("Reusing scan {} for {}", scan.id, scan.target);
    }
    Ok(scan)
}
