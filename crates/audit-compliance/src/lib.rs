//! AutoAudit Compliance Engine
//!
//! Turns raw scanner output for one target into a compliance report traced
//! back through a regulatory ontology.
//!
//! # Supported Frameworks
//!
//! - **GDPR**: security of processing, privacy by design, transparency
//! - **ePrivacy Directive**: cookie consent
//! - **WCAG 2.1**: accessibility success criteria
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        COMPLIANCE ENGINE                                │
//! │                                                                         │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ SSL Labs │  │ Headers  │  │ axe-core │  │  Nikto   │  │  Policy  │  │
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘  └────┬─────┘  └────┬─────┘  │
//! │       │  (JoinSet, per-adapter timeout)          │             │        │
//! │  ┌────▼─────────────▼─────────────▼─────────────▼─────────────▼─────┐  │
//! │  │              FINDING INGESTORS (Test Catalog)                     │  │
//! │  └────────────────────────────────┬──────────────────────────────────┘  │
//! │                                   │                                     │
//! │  ┌──────────────┐  ┌──────────────▼─────┐  ┌──────────────────────┐     │
//! │  │   Ontology   │──│ Correlation Mapper │──│  Report Aggregator   │     │
//! │  │   (seeded)   │  │     (MATCHES)      │  │  PASS / FAIL / ERROR │     │
//! │  └──────────────┘  └────────────────────┘  └──────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

/// External scanner adapters
pub mod adapters;
/// Test lookup and tool ownership
pub mod catalog;
/// Finding to requirement mapping
pub mod correlation;
/// Built-in regulatory ontology
pub mod frameworks;
/// Payload normalization into findings
pub mod ingest;
/// Seed records, seeding and the lookup index
pub mod ontology;
/// Concurrent adapter execution
pub mod pipeline;
/// Report aggregation
pub mod reporting;
/// Target validation and Scan creation
pub mod session;

use audit_graph::{GraphStore, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use adapters::{AdapterError, AdapterSettings, RawOutput, ScannerAdapter};
pub use catalog::{CatalogConfig, TestCatalog, TestRef, ToolKind};
pub use correlation::{CorrelationMapper, MappingSummary};
pub use ingest::{IngestOutcome, Ingestor};
pub use ontology::{OntologyError, OntologyIndex, OntologySeed, SeedReport};
pub use pipeline::{AdapterRun, PipelineConfig};
pub use reporting::{Report, ReportGenerator, ReportOptions, Status};

/// Compliance error types
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Target is not an http(s) URL or host
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// An adapter failed; logged, never returned from a scan
    #[error("adapter {tool} failed: {reason}")]
    AdapterFailure {
        /// Adapter name
        tool: String,
        /// Failure reason
        reason: String,
    },
    /// An adapter returned an unreadable payload; logged only
    #[error("malformed output from {tool}: {reason}")]
    MalformedAdapterOutput {
        /// Adapter name
        tool: String,
        /// Why the payload was rejected
        reason: String,
    },
    /// The graph store failed; aborts the scan
    #[error("store error: {0}")]
    Store(StoreError),
    /// Unknown scan id
    #[error("scan not found: {0}")]
    ScanNotFound(String),
}

impl From<StoreError> for ComplianceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ScanNotFound(id) => ComplianceError::ScanNotFound(id),
            other => ComplianceError::Store(other),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `[pipeline]`
    pub pipeline: PipelineConfig,
    /// `[catalog]`
    pub catalog: CatalogConfig,
}

/// Result of one completed scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Id of the new Scan
    pub scan_id: String,
    /// Rendered report
    pub report: Report,
}

/// Main Compliance Engine
pub struct ComplianceEngine {
    store: Arc<dyn GraphStore>,
    adapters: RwLock<Vec<Arc<dyn ScannerAdapter>>>,
    ingestor: Arc<Ingestor>,
    mapper: CorrelationMapper,
    index: RwLock<Arc<OntologyIndex>>,
    catalog: RwLock<Arc<TestCatalog>>,
    config: EngineConfig,
}

impl ComplianceEngine {
    /// Create an engine over `store` with an empty ontology view.
    ///
    /// Call [`ComplianceEngine::seed`] or [`ComplianceEngine::refresh_ontology`]
    /// before scanning.
    pub fn new(store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
        let catalog = Arc::new(TestCatalog::build(&Default::default(), config.catalog.clone()));
        Self {
            ingestor: Arc::new(Ingestor::new(Arc::clone(&store), Arc::clone(&catalog))),
            mapper: CorrelationMapper::new(Arc::clone(&store)),
            store,
            adapters: RwLock::new(Vec::new()),
            index: RwLock::new(Arc::new(OntologyIndex::default())),
            catalog: RwLock::new(catalog),
            config,
        }
    }

    /// Backing graph store
    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Upsert seed records, then rebuild the ontology index and catalog
    pub async fn seed(&self, seed: OntologySeed) -> Result<SeedReport, OntologyError> {
        let report = ontology::seed_ontology(self.store.as_ref(), seed).await?;
        self.refresh_ontology().await?;
        Ok(report)
    }

    /// Re-read the ontology from the store
    pub async fn refresh_ontology(&self) -> Result<(), StoreError> {
        let snapshot = self.store.ontology().await?;
        let index = Arc::new(OntologyIndex::build(&snapshot));
        let catalog = Arc::new(TestCatalog::build(&snapshot, self.config.catalog.clone()));
        self.ingestor.set_catalog(Arc::clone(&catalog));
        *self.catalog.write() = catalog;
        *self.index.write() = index;
        info!(
            "Loaded ontology: {} regulations, {} rules, {} requirements, {} tests",
            snapshot.regulations.len(),
            snapshot.rules.len(),
            snapshot.requirements.len(),
            snapshot.tests.len()
        );
        Ok(())
    }

    /// Add an adapter to every later scan
    pub fn register_adapter(&self, adapter: Arc<dyn ScannerAdapter>) {
        info!("Registered adapter {} ({})", adapter.name(), adapter.tool());
        self.adapters.write().push(adapter);
    }

    /// Registered adapters
    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }

    /// Shared ingestor
    pub fn ingestor(&self) -> Arc<Ingestor> {
        Arc::clone(&self.ingestor)
    }

    /// Current ontology index
    pub fn index(&self) -> Arc<OntologyIndex> {
        Arc::clone(&self.index.read())
    }

    /// Current Test catalog
    pub fn catalog(&self) -> Arc<TestCatalog> {
        Arc::clone(&self.catalog.read())
    }

    /// Validate the target and create its Scan
    pub async fn start_scan(&self, target: &str) -> Result<audit_graph::Scan, ComplianceError> {
        session::start_scan(self.store.as_ref(), target).await
    }

    /// Full session: adapters, ingestion, correlation, report
    pub async fn run_scan(&self, target: &str) -> Result<ScanResult, ComplianceError> {
        let scan = self.start_scan(target).await?;
        let adapters = self.adapters.read().clone();

        let runs = pipeline::execute_adapters(
            &adapters,
            Arc::clone(&self.ingestor),
            &scan.id,
            &scan.target,
            &self.config.pipeline,
        )
        .await?;

        let catalog = self.catalog();
        for run in pipeline::tool_runs(&scan.id, &runs, &catalog) {
            self.store.record_tool_run(run).await?;
        }

        // every adapter has been ingested at this point
        self.map_scan(&scan.id).await?;
        let report = self.build_report(&scan.id).await?;
        info!(
            "Scan {} complete: {} failing requirements across {} tests",
            scan.id, report.summary.total_failures, report.summary.total_tests
        );
        Ok(ScanResult {
            scan_id: scan.id,
            report,
        })
    }

    /// Ingest one payload out of band
    pub async fn ingest(
        &self,
        scan_id: &str,
        tool: ToolKind,
        raw: RawOutput,
        fallback_target: &str,
    ) -> Result<IngestOutcome, ComplianceError> {
        self.ingestor.ingest(scan_id, tool, raw, fallback_target).await
    }

    /// Link the scan's findings to requirements
    pub async fn map_scan(&self, scan_id: &str) -> Result<MappingSummary, ComplianceError> {
        let index = self.index();
        self.mapper.map_scan(scan_id, &index).await
    }

    /// Render the report for an existing scan
    pub async fn build_report(&self, scan_id: &str) -> Result<Report, ComplianceError> {
        let index = self.index();
        let catalog = self.catalog();
        ReportGenerator::build_report(
            self.store.as_ref(),
            scan_id,
            &index,
            &catalog,
            ReportOptions {
                synthetic_failures: self.config.pipeline.synthetic_failures,
            },
        )
        .await
    }
}
