//! Finding Ingestion
//!
//! Each scanner family has a pure extractor turning its raw payload into
//! finding candidates. The ingestor resolves their Test through the catalog
//! and writes them under the scan.

/// axe-core results
pub mod axe;
/// Cookie and privacy policy reports
pub mod cookies;
/// Response header snapshots
pub mod headers;
/// Nikto reports
pub mod nikto;
/// SSL Labs assessments
pub mod ssl;

use audit_graph::{EvidenceItem, FindingWrite, GraphStore, Severity, UpsertOutcome};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::RawOutput;
use crate::catalog::{TestCatalog, TestRef, ToolKind};
use crate::ComplianceError;

/// Normalized finding before it is written
#[derive(Debug, Clone, PartialEq)]
pub struct FindingCandidate {
    /// Deterministic finding id, prefixed with the tool
    pub id: String,
    /// Test the finding is `DETECTED_BY`, resolved through the catalog
    pub test: TestRef,
    /// Short title
    pub title: String,
    /// Normalized severity
    pub severity: Severity,
    /// Why this is a problem
    pub reason: String,
    /// Facts backing the finding
    pub evidence: Vec<EvidenceItem>,
}

/// Payload rejected by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPayload(pub String);

impl std::fmt::Display for MalformedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure transform from one tool's payload to finding candidates
pub trait FindingExtractor: Send + Sync {
    /// Tool whose payloads this extractor reads
    fn tool(&self) -> ToolKind;

    /// `fallback_target` is the originally requested target URL
    fn extract(
        &self,
        payload: &Value,
        fallback_target: &str,
    ) -> Result<Vec<FindingCandidate>, MalformedPayload>;
}

/// Result of one ingestion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Findings written
    Ingested {
        /// New findings
        created: usize,
        /// Findings written before in this scan
        refreshed: usize,
        /// Evidence items appended
        evidence: usize,
    },
    /// Payload was clean
    Empty,
    /// Payload rejected as malformed
    Skipped {
        reason: String,
    },
}

/// Routes payloads to extractors and writes their findings
pub struct Ingestor {
    store: Arc<dyn GraphStore>,
    catalog: RwLock<Arc<TestCatalog>>,
    extractors: DashMap<ToolKind, Arc<dyn FindingExtractor>>,
    stats: IngestStats,
}

#[derive(Default)]
struct IngestStats {
    findings_written: AtomicU64,
    payloads_skipped: AtomicU64,
}

impl Ingestor {
    /// Ingestor with every built-in extractor registered
    pub fn new(store: Arc<dyn GraphStore>, catalog: Arc<TestCatalog>) -> Self {
        let ingestor = Self {
            store,
            catalog: RwLock::new(catalog),
            extractors: DashMap::new(),
            stats: IngestStats::default(),
        };
        ingestor.register_default_extractors();
        ingestor
    }

    fn register_default_extractors(&self) {
        self.register(Arc::new(axe::AxeExtractor));
        self.register(Arc::new(ssl::SslExtractor));
        self.register(Arc::new(headers::HeadersExtractor));
        self.register(Arc::new(cookies::CookiesExtractor));
        self.register(Arc::new(nikto::NiktoExtractor));
    }

    /// Swap the catalog after the ontology changed
    pub fn set_catalog(&self, catalog: Arc<TestCatalog>) {
        *self.catalog.write() = catalog;
    }

    /// Replace the extractor for a tool
    pub fn register(&self, extractor: Arc<dyn FindingExtractor>) {
        self.extractors.insert(extractor.tool(), extractor);
    }

    /// Normalize and write one adapter payload.
    ///
    /// Only store failures are returned as errors.
    pub async fn ingest(
        &self,
        scan_id: &str,
        tool: ToolKind,
        raw: RawOutput,
        fallback_target: &str,
    ) -> Result<IngestOutcome, ComplianceError> {
        let extractor = match self.extractors.get(&tool) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                return Ok(self.skip(tool, format!("no ingestor registered for {}", tool)));
            }
        };

        let payload = raw.into_value();
        let candidates = match extractor.extract(&payload, fallback_target) {
            Ok(candidates) => candidates,
            Err(MalformedPayload(reason)) => return Ok(self.skip(tool, reason)),
        };

        if candidates.is_empty() {
            debug!("No actionable {} items for scan {}", tool, scan_id);
            return Ok(IngestOutcome::Empty);
        }

        let catalog = Arc::clone(&self.catalog.read());
        let (mut created, mut refreshed, mut evidence) = (0, 0, 0);
        for candidate in candidates {
            evidence += candidate.evidence.len();
            let write = FindingWrite {
                scan_id: scan_id.to_string(),
                test_id: catalog.resolve(tool, &candidate.test),
                finding_id: candidate.id,
                tool: tool.as_str().to_string(),
                title: candidate.title,
                severity: candidate.severity,
                reason: candidate.reason,
                evidence: candidate.evidence,
            };
            match self.store.upsert_finding(write).await? {
                UpsertOutcome::Created => created += 1,
                UpsertOutcome::Refreshed => refreshed += 1,
            }
        }

        self.stats
            .findings_written
            .fetch_add((created + refreshed) as u64, Ordering::Relaxed);
        debug!(
            "Ingested {} findings for scan {} ({} new, {} refreshed)",
            tool, scan_id, created, refreshed
        );
        Ok(IngestOutcome::Ingested {
            created,
            refreshed,
            evidence,
        })
    }

    fn skip(&self, tool: ToolKind, reason: String) -> IngestOutcome {
        warn!("Skipping malformed {} payload: {}", tool, reason);
        self.stats.payloads_skipped.fetch_add(1, Ordering::Relaxed);
        IngestOutcome::Skipped { reason }
    }

    /// (findings written, payloads skipped) since startup
    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.findings_written.load(Ordering::Relaxed),
            self.stats.payloads_skipped.load(Ordering::Relaxed),
        )
    }
}

// ============ Shared payload helpers ============

pub(crate) fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
}

/// Render a scalar JSON value as evidence text
pub(crate) fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Origin (`scheme://host[:port]`) of a URL or bare host
pub(crate) fn origin_of(input: &str) -> Option<String> {
    let trimmed = input.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = url::Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

/// Short stable hash used when a payload has no usable identifier
pub(crate) fn short_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..6])
}
