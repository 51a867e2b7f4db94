//! Correlation Mapper
//!
//! Batch pass linking every finding of a scan to the requirements tested by
//! the finding's Test.

use audit_graph::GraphStore;
use std::sync::Arc;
use tracing::debug;

use crate::ontology::OntologyIndex;
use crate::ComplianceError;

/// Counts from one mapping pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingSummary {
    /// Findings visited
    pub findings: usize,
    /// New `MATCHES` edges
    pub links_created: usize,
    /// Findings whose Test tests no requirement
    pub unmapped: usize,
}

/// Links findings to requirements through their Test
pub struct CorrelationMapper {
    store: Arc<dyn GraphStore>,
}

impl CorrelationMapper {
    /// Mapper writing to `store`
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Materialize `Finding -[:MATCHES]-> Requirement` edges. Idempotent.
    pub async fn map_scan(
        &self,
        scan_id: &str,
        index: &OntologyIndex,
    ) -> Result<MappingSummary, ComplianceError> {
        let graph = self.store.scan_graph(scan_id).await?;
        let mut summary = MappingSummary {
            findings: graph.findings.len(),
            ..Default::default()
        };

        for stored in &graph.findings {
            let finding = &stored.finding;
            let mut matched = false;
            for requirement in index.requirements_for_test(&finding.test_id) {
                matched = true;
                let created = self
                    .store
                    .link_match(
                        scan_id,
                        &finding.id,
                        &requirement.id,
                        Some(finding.reason.clone()),
                    )
                    .await?;
                if created {
                    summary.links_created += 1;
                }
            }
            if !matched {
                summary.unmapped += 1;
            }
        }

        debug!(
            "Mapped scan {}: {} findings, {} new links, {} unmapped",
            scan_id, summary.findings, summary.links_created, summary.unmapped
        );
        Ok(summary)
    }
}
