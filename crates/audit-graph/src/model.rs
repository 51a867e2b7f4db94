//! Graph Model
//!
//! Ontology nodes (Regulation, Rule, Requirement, Test) are global and keyed
//! by id. Scan-scoped nodes (Finding, Evidence, ToolRun) only exist under the
//! Scan that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Shared severity scale every tool vocabulary is normalized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No direct impact
    Info,
    /// Alias `low`
    #[serde(alias = "low")]
    Minor,
    /// Alias `medium`
    #[serde(alias = "medium")]
    Moderate,
    /// Alias `high`
    #[serde(alias = "high")]
    Serious,
    Critical,
}

impl Severity {
    /// Parse either vocabulary of the scale (`minor`/`low`, `moderate`/`medium`, ...)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" | "informational" | "none" => Some(Self::Info),
            "minor" | "low" => Some(Self::Minor),
            "moderate" | "medium" => Some(Self::Moderate),
            "serious" | "high" => Some(Self::Serious),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an idempotent upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    /// The node did not exist
    Created,
    /// An existing node was updated in place
    Refreshed,
}

// ============ Ontology ============

/// Named compliance framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regulation {
    /// Stable id, e.g. `gdpr`
    pub id: String,
    /// Display name
    pub name: String,
    /// Issuing jurisdiction
    pub jurisdiction: Option<String>,
    /// Version label
    pub version: Option<String>,
    /// Free-text description
    pub description: Option<String>,
}

impl Regulation {
    /// Refresh the supplied fields, keep the rest
    pub fn merge(&mut self, update: Regulation) {
        coalesce_str(&mut self.name, update.name);
        coalesce(&mut self.jurisdiction, update.jurisdiction);
        coalesce(&mut self.version, update.version);
        coalesce(&mut self.description, update.description);
    }
}

/// Article or clause of a regulation (`UNDER` exactly one Regulation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable id, e.g. `gdpr-art-32-1-a`
    pub id: String,
    /// `UNDER` edge
    pub regulation_id: String,
    /// Article or clause number as printed
    pub article_number: Option<String>,
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: Option<String>,
}

impl Rule {
    /// Refresh the supplied fields, keep the rest
    pub fn merge(&mut self, update: Rule) {
        coalesce_str(&mut self.regulation_id, update.regulation_id);
        coalesce(&mut self.article_number, update.article_number);
        coalesce_str(&mut self.title, update.title);
        coalesce(&mut self.description, update.description);
    }
}

/// Compliance obligation
///
/// `rule_ids` are the `PART_OF` edges and `test_ids` the `TESTED_BY` edges.
/// Edges only ever accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Remediation shown next to violations
    pub fix_suggestion: Option<String>,
    /// Severity used when a finding carries none
    pub severity_default: Severity,
    /// `PART_OF` targets
    #[serde(default)]
    pub rule_ids: BTreeSet<String>,
    /// `TESTED_BY` targets
    #[serde(default)]
    pub test_ids: BTreeSet<String>,
}

impl Requirement {
    /// Refresh text fields and union the edge sets
    pub fn merge(&mut self, update: Requirement) {
        coalesce_str(&mut self.name, update.name);
        coalesce_str(&mut self.description, update.description);
        coalesce(&mut self.fix_suggestion, update.fix_suggestion);
        self.severity_default = update.severity_default;
        self.rule_ids.extend(update.rule_ids);
        self.test_ids.extend(update.test_ids);
    }
}

/// Stable identity of one external scanner or check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    /// Stable id findings reference through `DETECTED_BY`
    pub id: String,
    /// Display name
    pub name: String,
    /// Tool family name or alias, e.g. `axe` or `ssl-labs`
    pub tool: Option<String>,
    /// Invocation, informational only
    pub command: Option<String>,
}

impl Test {
    /// Refresh the supplied fields, keep the rest
    pub fn merge(&mut self, update: Test) {
        coalesce_str(&mut self.name, update.name);
        coalesce(&mut self.tool, update.tool);
        coalesce(&mut self.command, update.command);
    }
}

/// Read-only copy of the whole ontology, ordered by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySnapshot {
    /// Regulations
    pub regulations: Vec<Regulation>,
    /// Rules
    pub rules: Vec<Rule>,
    /// Requirements
    pub requirements: Vec<Requirement>,
    /// Tests
    pub tests: Vec<Test>,
}

// ============ Scan-scoped ============

/// One audit run against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    /// UUID
    pub id: String,
    /// Normalized absolute URL
    pub target: String,
    /// First write
    pub created_at: DateTime<Utc>,
}

impl Scan {
    /// Create a scan with a fresh UUID
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            created_at: Utc::now(),
        }
    }
}

/// Key/value fact attached to a finding write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Evidence key
    pub key: String,
    /// Evidence value
    pub value: String,
}

impl EvidenceItem {
    /// Build an item from any string-like key and value
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Stored evidence node (`HAS_EVIDENCE`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Fresh per write; evidence is append-only
    pub id: Uuid,
    /// Evidence key
    pub key: String,
    /// Evidence value
    pub value: String,
    /// Write time
    pub recorded_at: DateTime<Utc>,
}

impl From<EvidenceItem> for Evidence {
    fn from(item: EvidenceItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: item.key,
            value: item.value,
            recorded_at: Utc::now(),
        }
    }
}

/// Upsert request for a finding plus the evidence to append
#[derive(Debug, Clone)]
pub struct FindingWrite {
    /// Owning scan
    pub scan_id: String,
    /// Deterministic id, stable across re-ingestion
    pub finding_id: String,
    /// Tool family name
    pub tool: String,
    /// Resolved `DETECTED_BY` Test
    pub test_id: String,
    /// Short title
    pub title: String,
    /// Normalized severity
    pub severity: Severity,
    /// Why this is a problem, carried onto `MATCHES` edges
    pub reason: String,
    /// Evidence trail
    pub evidence: Vec<EvidenceItem>,
}

/// Concrete issue detected by one test during one scan
///
/// `scan_id` is the `FOUND` edge and `test_id` the `DETECTED_BY` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable id
    pub id: String,
    /// Owning scan
    pub scan_id: String,
    /// Tool family name
    pub tool: String,
    /// `DETECTED_BY` Test
    pub test_id: String,
    /// Short title
    pub title: String,
    /// Normalized severity
    pub severity: Severity,
    /// Why it matched
    pub reason: String,
    /// First write
    pub created_at: DateTime<Utc>,
    /// Last refresh
    pub updated_at: DateTime<Utc>,
    /// Incremented on every refresh
    pub version: u32,
}

impl Finding {
    /// Build the node for a first write
    pub fn create(write: &FindingWrite) -> Self {
        let now = Utc::now();
        Self {
            id: write.finding_id.clone(),
            scan_id: write.scan_id.clone(),
            tool: write.tool.clone(),
            test_id: write.test_id.clone(),
            title: write.title.clone(),
            severity: write.severity,
            reason: write.reason.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Refresh display fields on a repeated write.
    ///
    /// Identity, scan, test and creation time never change.
    pub fn refresh(&mut self, write: &FindingWrite) {
        self.title = write.title.clone();
        self.severity = write.severity;
        self.reason = write.reason.clone();
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

/// `MATCHES` edge from a finding to a requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEdge {
    /// Matched requirement
    pub requirement_id: String,
    /// Why it matched
    pub reason: Option<String>,
}

/// How an adapter invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolOutcome {
    /// Payload returned and ingested
    Succeeded,
    /// Error or timeout
    Failed,
    /// Payload returned but unreadable
    Malformed,
}

impl ToolOutcome {
    /// Anything but success turns the owning Tests into ERROR
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Succeeded)
    }
}

/// Outcome of one adapter for one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRun {
    /// Owning scan
    pub scan_id: String,
    /// Tool family name
    pub tool: String,
    /// Adapter name; several adapters may report for one tool
    #[serde(default)]
    pub adapter: String,
    /// Test the adapter reports under, when it has a dedicated one
    #[serde(default)]
    pub test_id: Option<String>,
    /// How the run ended
    pub outcome: ToolOutcome,
    /// Failure reason shown on ERROR Tests
    pub reason: Option<String>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
}

impl ToolRun {
    /// Store key: one run per (tool, adapter)
    pub fn key(&self) -> (String, String) {
        (self.tool.clone(), self.adapter.clone())
    }
}

/// Finding with its evidence trail and requirement matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFinding {
    /// Finding node
    pub finding: Finding,
    /// Evidence trail
    pub evidence: Vec<Evidence>,
    /// `MATCHES` edges
    pub matches: Vec<MatchEdge>,
}

/// Everything stored under one scan, ordered by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanGraph {
    /// Scan node
    pub scan: Scan,
    /// Findings ordered by id
    pub findings: Vec<StoredFinding>,
    /// One run per adapter
    pub tool_runs: Vec<ToolRun>,
}

fn coalesce(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

fn coalesce_str(slot: &mut String, value: String) {
    if !value.is_empty() {
        *slot = value;
    }
}
