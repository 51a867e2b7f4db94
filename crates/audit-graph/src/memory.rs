//! In-memory graph store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::*;
use crate::store::{GraphStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub(crate) struct OntologyState {
    pub(crate) regulations: BTreeMap<String, Regulation>,
    pub(crate) rules: BTreeMap<String, Rule>,
    pub(crate) requirements: BTreeMap<String, Requirement>,
    pub(crate) tests: BTreeMap<String, Test>,
}

#[derive(Debug)]
pub(crate) struct FindingNode {
    pub(crate) finding: Finding,
    pub(crate) evidence: Vec<Evidence>,
    pub(crate) matches: BTreeMap<String, Option<String>>,
}

#[derive(Debug)]
pub(crate) struct ScanState {
    pub(crate) scan: Scan,
    pub(crate) findings: BTreeMap<String, FindingNode>,
    pub(crate) tool_runs: BTreeMap<(String, String), ToolRun>,
}

impl ScanState {
    fn new(scan: Scan) -> Self {
        Self {
            scan,
            findings: BTreeMap::new(),
            tool_runs: BTreeMap::new(),
        }
    }
}

/// Default store: ontology behind one lock, scans sharded by id
pub struct InMemoryGraphStore {
    pub(crate) ontology: RwLock<OntologyState>,
    pub(crate) scans: DashMap<String, ScanState>,
}

impl InMemoryGraphStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            ontology: RwLock::new(OntologyState::default()),
            scans: DashMap::new(),
        }
    }

    /// Number of stored scans
    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert_by_id<T>(
    map: &mut BTreeMap<String, T>,
    id: String,
    value: T,
    merge: impl FnOnce(&mut T, T),
) -> UpsertOutcome {
    match map.get_mut(&id) {
        Some(existing) => {
            merge(existing, value);
            UpsertOutcome::Refreshed
        }
        None => {
            map.insert(id, value);
            UpsertOutcome::Created
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_regulation(&self, regulation: Regulation) -> StoreResult<UpsertOutcome> {
        let mut state = self.ontology.write();
        let id = regulation.id.clone();
        Ok(upsert_by_id(&mut state.regulations, id, regulation, Regulation::merge))
    }

    async fn upsert_rule(&self, rule: Rule) -> StoreResult<UpsertOutcome> {
        let mut state = self.ontology.write();
        let id = rule.id.clone();
        Ok(upsert_by_id(&mut state.rules, id, rule, Rule::merge))
    }

    async fn upsert_requirement(&self, requirement: Requirement) -> StoreResult<UpsertOutcome> {
        let mut state = self.ontology.write();
        let id = requirement.id.clone();
        Ok(upsert_by_id(&mut state.requirements, id, requirement, Requirement::merge))
    }

    async fn upsert_test(&self, test: Test) -> StoreResult<UpsertOutcome> {
        let mut state = self.ontology.write();
        let id = test.id.clone();
        Ok(upsert_by_id(&mut state.tests, id, test, Test::merge))
    }

    async fn link_part_of(&self, requirement_id: &str, rule_id: &str) -> StoreResult<bool> {
        let mut state = self.ontology.write();
        if !state.rules.contains_key(rule_id) {
            return Err(StoreError::NotFound {
                entity: "Rule",
                id: rule_id.to_string(),
            });
        }
        let requirement = state
            .requirements
            .get_mut(requirement_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Requirement",
                id: requirement_id.to_string(),
            })?;
        Ok(requirement.rule_ids.insert(rule_id.to_string()))
    }

    async fn link_tested_by(&self, requirement_id: &str, test_id: &str) -> StoreResult<bool> {
        let mut state = self.ontology.write();
        if !state.tests.contains_key(test_id) {
            return Err(StoreError::NotFound {
                entity: "Test",
                id: test_id.to_string(),
            });
        }
        let requirement = state
            .requirements
            .get_mut(requirement_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Requirement",
                id: requirement_id.to_string(),
            })?;
        Ok(requirement.test_ids.insert(test_id.to_string()))
    }

    async fn ontology(&self) -> StoreResult<OntologySnapshot> {
        let state = self.ontology.read();
        Ok(OntologySnapshot {
            regulations: state.regulations.values().cloned().collect(),
            rules: state.rules.values().cloned().collect(),
            requirements: state.requirements.values().cloned().collect(),
            tests: state.tests.values().cloned().collect(),
        })
    }

    async fn count_tests(&self) -> StoreResult<usize> {
        Ok(self.ontology.read().tests.len())
    }

    async fn upsert_scan(&self, scan: Scan) -> StoreResult<(Scan, UpsertOutcome)> {
        let entry = self.scans.entry(scan.id.clone());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                Ok((existing.get().scan.clone(), UpsertOutcome::Refreshed))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!("Created scan {} for {}", scan.id, scan.target);
                slot.insert(ScanState::new(scan.clone()));
                Ok((scan, UpsertOutcome::Created))
            }
        }
    }

    async fn get_scan(&self, scan_id: &str) -> StoreResult<Option<Scan>> {
        Ok(self.scans.get(scan_id).map(|state| state.scan.clone()))
    }

    async fn upsert_finding(&self, write: FindingWrite) -> StoreResult<UpsertOutcome> {
        let mut state = self
            .scans
            .get_mut(&write.scan_id)
            .ok_or_else(|| StoreError::ScanNotFound(write.scan_id.clone()))?;

        let evidence: Vec<Evidence> = write.evidence.iter().cloned().map(Evidence::from).collect();

        let outcome = match state.findings.get_mut(&write.finding_id) {
            Some(node) => {
                node.finding.refresh(&write);
                node.evidence.extend(evidence);
                UpsertOutcome::Refreshed
            }
            None => {
                state.findings.insert(
                    write.finding_id.clone(),
                    FindingNode {
                        finding: Finding::create(&write),
                        evidence,
                        matches: BTreeMap::new(),
                    },
                );
                UpsertOutcome::Created
            }
        };
        Ok(outcome)
    }

    async fn link_match(
        &self,
        scan_id: &str,
        finding_id: &str,
        requirement_id: &str,
        reason: Option<String>,
    ) -> StoreResult<bool> {
        if !self.ontology.read().requirements.contains_key(requirement_id) {
            return Err(StoreError::NotFound {
                entity: "Requirement",
                id: requirement_id.to_string(),
            });
        }

        let mut state = self
            .scans
            .get_mut(scan_id)
            .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_string()))?;
        let node = state
            .findings
            .get_mut(finding_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Finding",
                id: finding_id.to_string(),
            })?;

        if node.matches.contains_key(requirement_id) {
            return Ok(false);
        }
        node.matches.insert(requirement_id.to_string(), reason);
        Ok(true)
    }

    async fn record_tool_run(&self, run: ToolRun) -> StoreResult<()> {
        let mut state = self
            .scans
            .get_mut(&run.scan_id)
            .ok_or_else(|| StoreError::ScanNotFound(run.scan_id.clone()))?;
        state.tool_runs.insert(run.key(), run);
        Ok(())
    }

    async fn scan_graph(&self, scan_id: &str) -> StoreResult<ScanGraph> {
        let state = self
            .scans
            .get(scan_id)
            .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_string()))?;
        Ok(state.to_graph())
    }
}

impl ScanState {
    pub(crate) fn to_graph(&self) -> ScanGraph {
        ScanGraph {
            scan: self.scan.clone(),
            findings: self
                .findings
                .values()
                .map(|node| StoredFinding {
                    finding: node.finding.clone(),
                    evidence: node.evidence.clone(),
                    matches: node
                        .matches
                        .iter()
                        .map(|(requirement_id, reason)| MatchEdge {
                            requirement_id: requirement_id.clone(),
                            reason: reason.clone(),
                        })
                        .collect(),
                })
                .collect(),
            tool_runs: self.tool_runs.values().cloned().collect(),
        }
    }

    pub(crate) fn from_graph(graph: ScanGraph) -> Self {
        let findings = graph
            .findings
            .into_iter()
            .map(|stored| {
                let matches = stored
                    .matches
                    .into_iter()
                    .map(|edge| (edge.requirement_id, edge.reason))
                    .collect();
                (
                    stored.finding.id.clone(),
                    FindingNode {
                        finding: stored.finding,
                        evidence: stored.evidence,
                        matches,
                    },
                )
            })
            .collect();
        let tool_runs = graph
            .tool_runs
            .into_iter()
            .map(|run| (run.key(), run))
            .collect();
        Self {
            scan: graph.scan,
            findings,
            tool_runs,
        }
    }
}

/// Helper for tests and callers that want a tool run stamped now
pub fn tool_run(scan_id: &str, tool: &str, outcome: ToolOutcome, reason: Option<String>) -> ToolRun {
    ToolRun {
        scan_id: scan_id.to_string(),
        tool: tool.to_string(),
        adapter: tool.to_string(),
        test_id: None,
        outcome,
        reason,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(id: &str) -> Requirement {
        Requirement {
            id: id.into(),
            name: format!("Requirement {}", id),
            description: "desc".into(),
            fix_suggestion: None,
            severity_default: Severity::Moderate,
            rule_ids: Default::default(),
            test_ids: Default::default(),
        }
    }

    fn write(scan_id: &str, finding_id: &str) -> FindingWrite {
        FindingWrite {
            scan_id: scan_id.into(),
            finding_id: finding_id.into(),
            tool: "axe".into(),
            test_id: "image-alt".into(),
            title: "Images must have alternate text".into(),
            severity: Severity::Critical,
            reason: "Images must have alternate text".into(),
            evidence: vec![EvidenceItem::new("axerule", "image-alt")],
        }
    }

    #[tokio::test]
    async fn test_upsert_finding_is_idempotent_and_appends_evidence() {
        let store = InMemoryGraphStore::new();
        let (scan, _) = store.upsert_scan(Scan::new("https://example.com/")).await.unwrap();

        let first = store.upsert_finding(write(&scan.id, "axe:image-alt:#a")).await.unwrap();
        let second = store.upsert_finding(write(&scan.id, "axe:image-alt:#a")).await.unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Refreshed);

        let graph = store.scan_graph(&scan.id).await.unwrap();
        assert_eq!(graph.findings.len(), 1);
        assert_eq!(graph.findings[0].evidence.len(), 2);
        assert_eq!(graph.findings[0].finding.version, 2);
    }

    #[tokio::test]
    async fn test_same_finding_id_in_two_scans_is_two_findings() {
        let store = InMemoryGraphStore::new();
        let (a, _) = store.upsert_scan(Scan::new("https://a.example/")).await.unwrap();
        let (b, _) = store.upsert_scan(Scan::new("https://a.example/")).await.unwrap();

        store.upsert_finding(write(&a.id, "ssl:10.0.0.1")).await.unwrap();
        store.upsert_finding(write(&b.id, "ssl:10.0.0.1")).await.unwrap();

        assert_eq!(store.scan_graph(&a.id).await.unwrap().findings.len(), 1);
        assert_eq!(store.scan_graph(&b.id).await.unwrap().findings.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_scan_keeps_existing() {
        let store = InMemoryGraphStore::new();
        let scan = Scan::new("https://example.com/");
        let mut again = scan.clone();
        again.target = "https://other.example/".into();

        store.upsert_scan(scan.clone()).await.unwrap();
        let (kept, outcome) = store.upsert_scan(again).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Refreshed);
        assert_eq!(kept.target, "https://example.com/");
        assert_eq!(store.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_finding_requires_scan() {
        let store = InMemoryGraphStore::new();
        let result = store.upsert_finding(write("missing", "axe:x:y")).await;
        assert!(matches!(result, Err(StoreError::ScanNotFound(_))));
    }

    #[tokio::test]
    async fn test_link_match_is_idempotent() {
        let store = InMemoryGraphStore::new();
        store.upsert_requirement(requirement("req-1")).await.unwrap();
        let (scan, _) = store.upsert_scan(Scan::new("https://example.com/")).await.unwrap();
        store.upsert_finding(write(&scan.id, "axe:image-alt:#a")).await.unwrap();

        let added = store
            .link_match(&scan.id, "axe:image-alt:#a", "req-1", Some("missing alt".into()))
            .await
            .unwrap();
        let again = store
            .link_match(&scan.id, "axe:image-alt:#a", "req-1", Some("missing alt".into()))
            .await
            .unwrap();

        assert!(added);
        assert!(!again);
        let graph = store.scan_graph(&scan.id).await.unwrap();
        assert_eq!(graph.findings[0].matches.len(), 1);
        assert_eq!(graph.findings[0].matches[0].reason.as_deref(), Some("missing alt"));
    }

    #[tokio::test]
    async fn test_link_tested_by_requires_both_ends() {
        let store = InMemoryGraphStore::new();
        store.upsert_requirement(requirement("req-1")).await.unwrap();

        let missing = store.link_tested_by("req-1", "ssl-labs").await;
        assert!(matches!(missing, Err(StoreError::NotFound { entity: "Test", .. })));

        store
            .upsert_test(Test {
                id: "ssl-labs".into(),
                name: "SSL Labs".into(),
                tool: Some("ssl".into()),
                command: None,
            })
            .await
            .unwrap();
        assert!(store.link_tested_by("req-1", "ssl-labs").await.unwrap());
        assert!(!store.link_tested_by("req-1", "ssl-labs").await.unwrap());
        assert_eq!(store.count_tests().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tool_run_replaced_per_tool() {
        let store = InMemoryGraphStore::new();
        let (scan, _) = store.upsert_scan(Scan::new("https://example.com/")).await.unwrap();

        store
            .record_tool_run(tool_run(&scan.id, "headers", ToolOutcome::Failed, Some("timeout".into())))
            .await
            .unwrap();
        store
            .record_tool_run(tool_run(&scan.id, "headers", ToolOutcome::Succeeded, None))
            .await
            .unwrap();

        let graph = store.scan_graph(&scan.id).await.unwrap();
        assert_eq!(graph.tool_runs.len(), 1);
        assert_eq!(graph.tool_runs[0].outcome, ToolOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_tool_runs_kept_per_adapter() {
        let store = InMemoryGraphStore::new();
        let (scan, _) = store.upsert_scan(Scan::new("https://example.com/")).await.unwrap();

        let mut policy = tool_run(&scan.id, "cookies", ToolOutcome::Failed, Some("HTTP 502".into()));
        policy.adapter = "privacy-policy".into();
        store.record_tool_run(policy).await.unwrap();
        store
            .record_tool_run(tool_run(&scan.id, "cookies", ToolOutcome::Succeeded, None))
            .await
            .unwrap();

        let graph = store.scan_graph(&scan.id).await.unwrap();
        assert_eq!(graph.tool_runs.len(), 2);
        assert_eq!(graph.tool_runs[0].adapter, "cookies");
        assert_eq!(graph.tool_runs[1].adapter, "privacy-policy");
        assert!(graph.tool_runs[1].outcome.is_error());
    }
}
