//! Graph store trait
//!
//! Storage-agnostic access to the knowledge graph. Every write is an
//! idempotent upsert or link so concurrent ingestors for the same scan
//! never duplicate nodes or edges.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::*;

/// Store operation result
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown scan id
    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    /// Missing node a link refers to
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Node label
        entity: &'static str,
        /// Node id
        id: String,
    },

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot read or write failure
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Snapshot(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Snapshot(err.to_string())
    }
}

/// Knowledge graph persistence
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ---- Ontology ----

    /// Create or coalesce-refresh a regulation
    async fn upsert_regulation(&self, regulation: Regulation) -> StoreResult<UpsertOutcome>;

    /// Create or coalesce-refresh a rule
    async fn upsert_rule(&self, rule: Rule) -> StoreResult<UpsertOutcome>;

    /// Create or refresh a requirement; edge sets are unioned
    async fn upsert_requirement(&self, requirement: Requirement) -> StoreResult<UpsertOutcome>;

    /// Create or coalesce-refresh a test
    async fn upsert_test(&self, test: Test) -> StoreResult<UpsertOutcome>;

    /// Add `Requirement -[:PART_OF]-> Rule`. Returns false when already present.
    async fn link_part_of(&self, requirement_id: &str, rule_id: &str) -> StoreResult<bool>;

    /// Add `Requirement -[:TESTED_BY]-> Test`. Returns false when already present.
    async fn link_tested_by(&self, requirement_id: &str, test_id: &str) -> StoreResult<bool>;

    /// Full ontology ordered by id
    async fn ontology(&self) -> StoreResult<OntologySnapshot>;

    /// Number of Test nodes
    async fn count_tests(&self) -> StoreResult<usize>;

    // ---- Scans ----

    /// Insert a scan. An existing scan with the same id is left untouched.
    async fn upsert_scan(&self, scan: Scan) -> StoreResult<(Scan, UpsertOutcome)>;

    /// Look up one scan
    async fn get_scan(&self, scan_id: &str) -> StoreResult<Option<Scan>>;

    /// Upsert a finding under its scan and append its evidence
    async fn upsert_finding(&self, write: FindingWrite) -> StoreResult<UpsertOutcome>;

    /// Add `Finding -[:MATCHES]-> Requirement`. Returns false when already present.
    async fn link_match(
        &self,
        scan_id: &str,
        finding_id: &str,
        requirement_id: &str,
        reason: Option<String>,
    ) -> StoreResult<bool>;

    /// Record (or replace) the outcome of one adapter for one scan
    async fn record_tool_run(&self, run: ToolRun) -> StoreResult<()>;

    /// Everything stored under one scan
    async fn scan_graph(&self, scan_id: &str) -> StoreResult<ScanGraph>;
}
