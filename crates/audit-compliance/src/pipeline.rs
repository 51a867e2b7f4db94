//! Scan Pipeline
//!
//! Runs every adapter concurrently under its own timeout and hands each
//! payload to its ingestor. Each adapter gets its own outcome.

use audit_graph::{ToolOutcome, ToolRun};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use crate::adapters::{AdapterError, ScannerAdapter};
use crate::catalog::{TestCatalog, TestRef, ToolKind};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::ComplianceError;

/// `[pipeline]` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default timeout for one adapter call
    #[serde(with = "duration_secs")]
    pub adapter_timeout: Duration,
    /// Per-tool overrides in seconds, keyed by tool name
    pub tool_timeouts: BTreeMap<String, u64>,
    /// Add an execution-failure violation per failed adapter
    pub synthetic_failures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // SSL Labs assessments poll for up to ten minutes
        let tool_timeouts = BTreeMap::from([(ToolKind::Ssl.as_str().to_string(), 660)]);
        Self {
            adapter_timeout: Duration::from_secs(120),
            tool_timeouts,
            synthetic_failures: true,
        }
    }
}

impl PipelineConfig {
    /// Timeout applied to `tool`'s adapters
    pub fn timeout_for(&self, tool: ToolKind) -> Duration {
        self.tool_timeouts
            .get(tool.as_str())
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(self.adapter_timeout)
    }
}

/// Outcome of one adapter within a scan
#[derive(Debug, Clone)]
pub struct AdapterRun {
    /// Tool the adapter reports for
    pub tool: ToolKind,
    /// Adapter name
    pub adapter: String,
    /// Test the adapter reports under
    pub test_ref: TestRef,
    /// How the adapter call ended
    pub outcome: ToolOutcome,
    /// Failure reason
    pub reason: Option<String>,
    /// Ingestion result when a payload came back
    pub ingest: Option<IngestOutcome>,
}

impl AdapterRun {
    fn aborted(tool: ToolKind, adapter: String, test_ref: TestRef) -> Self {
        Self {
            tool,
            adapter,
            test_ref,
            outcome: ToolOutcome::Failed,
            reason: Some("adapter task aborted".into()),
            ingest: None,
        }
    }
}

/// Run all adapters for one scan and ingest their payloads.
///
/// Adapter failures are recorded in the returned runs; only store failures
/// abort the scan.
pub async fn execute_adapters(
    adapters: &[Arc<dyn ScannerAdapter>],
    ingestor: Arc<Ingestor>,
    scan_id: &str,
    target: &str,
    config: &PipelineConfig,
) -> Result<Vec<AdapterRun>, ComplianceError> {
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<task::Id, (ToolKind, String, TestRef)> = HashMap::new();

    for adapter in adapters {
        let adapter = Arc::clone(adapter);
        let ingestor = Arc::clone(&ingestor);
        let scan_id = scan_id.to_string();
        let target = target.to_string();
        let limit = config.timeout_for(adapter.tool());
        let identity = (adapter.tool(), adapter.name().to_string(), adapter.test_ref());

        let handle = tasks.spawn(async move {
            let tool = adapter.tool();
            let name = adapter.name().to_string();
            let test_ref = adapter.test_ref();
            info!("Running {} against {}", name, target);

            let result = match tokio::time::timeout(limit, adapter.run_scan(&target)).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(limit.as_secs())),
            };

            let run = match result {
                Ok(raw) => match ingestor.ingest(&scan_id, tool, raw, &target).await? {
                    IngestOutcome::Skipped { reason } => {
                        warn!(
                            "{}",
                            ComplianceError::MalformedAdapterOutput {
                                tool: name.clone(),
                                reason: reason.clone(),
                            }
                        );
                        AdapterRun {
                            tool,
                            adapter: name,
                            test_ref,
                            outcome: ToolOutcome::Malformed,
                            reason: Some(reason.clone()),
                            ingest: Some(IngestOutcome::Skipped { reason }),
                        }
                    }
                    outcome => {
                        info!("{} finished for scan {}", name, scan_id);
                        AdapterRun {
                            tool,
                            adapter: name,
                            test_ref,
                            outcome: ToolOutcome::Succeeded,
                            reason: None,
                            ingest: Some(outcome),
                        }
                    }
                },
                Err(err) => {
                    let outcome = match err {
                        AdapterError::Malformed(_) => ToolOutcome::Malformed,
                        _ => ToolOutcome::Failed,
                    };
                    warn!(
                        "{}",
                        ComplianceError::AdapterFailure {
                            tool: name.clone(),
                            reason: err.to_string(),
                        }
                    );
                    AdapterRun {
                        tool,
                        adapter: name,
                        test_ref,
                        outcome,
                        reason: Some(err.to_string()),
                        ingest: None,
                    }
                }
            };
            Ok::<AdapterRun, ComplianceError>(run)
        });
        pending.insert(handle.id(), identity);
    }

    let mut runs = Vec::with_capacity(adapters.len());
    let mut fatal = None;
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(run))) => {
                pending.remove(&id);
                runs.push(run);
            }
            Ok((id, Err(e))) => {
                pending.remove(&id);
                error!("Scan {} aborted by store failure: {}", scan_id, e);
                fatal.get_or_insert(e);
            }
            Err(e) => {
                error!("Adapter task for scan {} did not complete: {}", scan_id, e);
                if let Some((tool, adapter, test_ref)) = pending.remove(&e.id()) {
                    runs.push(AdapterRun::aborted(tool, adapter, test_ref));
                }
            }
        }
    }
    if let Some(e) = fatal {
        return Err(e);
    }

    runs.sort_by(|a, b| (a.tool, &a.adapter).cmp(&(b.tool, &b.adapter)));
    debug!("Scan {} finished {} adapter runs", scan_id, runs.len());
    Ok(runs)
}

/// One ToolRun per adapter, tagged with the Test it reports under.
pub fn tool_runs(scan_id: &str, runs: &[AdapterRun], catalog: &TestCatalog) -> Vec<ToolRun> {
    let finished_at = Utc::now();
    runs.iter()
        .map(|run| ToolRun {
            scan_id: scan_id.to_string(),
            tool: run.tool.as_str().to_string(),
            adapter: run.adapter.clone(),
            test_id: Some(catalog.resolve(run.tool, &run.test_ref)),
            outcome: run.outcome,
            reason: run.reason.clone(),
            finished_at,
        })
        .collect()
}

/// Durations as integer seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RawOutput;
    use crate::catalog::CatalogConfig;
    use async_trait::async_trait;
    use audit_graph::{GraphStore, InMemoryGraphStore, OntologySnapshot, Scan, Test};

    fn run(
        tool: ToolKind,
        adapter: &str,
        test_ref: TestRef,
        outcome: ToolOutcome,
        reason: Option<&str>,
    ) -> AdapterRun {
        AdapterRun {
            tool,
            adapter: adapter.into(),
            test_ref,
            outcome,
            reason: reason.map(Into::into),
            ingest: None,
        }
    }

    fn catalog() -> TestCatalog {
        let ontology = OntologySnapshot {
            tests: ["cookies", "privacy-policy", "ssl-labs"]
                .into_iter()
                .map(|id| Test {
                    id: id.into(),
                    name: id.into(),
                    tool: None,
                    command: None,
                })
                .collect(),
            ..OntologySnapshot::default()
        };
        TestCatalog::build(&ontology, CatalogConfig::default())
    }

    /// Same name for every instance; `panics` decides whether the call blows up
    struct Twin {
        panics: bool,
    }

    #[async_trait]
    impl ScannerAdapter for Twin {
        fn tool(&self) -> ToolKind {
            ToolKind::Ssl
        }

        fn name(&self) -> &str {
            "twin"
        }

        async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
            if self.panics {
                panic!("scanner crashed");
            }
            Ok(RawOutput::Json(serde_json::json!({
                "host": "example.com",
                "endpoints": [{ "ipAddress": "93.184.216.34", "grade": "A" }]
            })))
        }
    }

    #[test]
    fn test_timeout_override() {
        let mut config = PipelineConfig::default();
        config.tool_timeouts.insert("nikto".into(), 45);
        assert_eq!(config.timeout_for(ToolKind::Nikto), Duration::from_secs(45));
        assert_eq!(config.timeout_for(ToolKind::Axe), Duration::from_secs(120));
        assert_eq!(config.timeout_for(ToolKind::Ssl), Duration::from_secs(660));
    }

    #[test]
    fn test_config_durations_are_seconds() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"adapter_timeout": 30, "tool_timeouts": {"ssl": 300}}"#).unwrap();
        assert_eq!(config.adapter_timeout, Duration::from_secs(30));
        assert_eq!(config.timeout_for(ToolKind::Ssl), Duration::from_secs(300));
        assert!(config.synthetic_failures);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["adapter_timeout"], 30);
    }

    #[test]
    fn test_tool_runs_kept_per_adapter() {
        let runs = vec![
            run(ToolKind::Cookies, "cookies", TestRef::ToolDefault, ToolOutcome::Succeeded, None),
            run(
                ToolKind::Cookies,
                "privacy-policy",
                TestRef::PolicyCheck("privacy-policy".into()),
                ToolOutcome::Failed,
                Some("HTTP 502"),
            ),
        ];

        let recorded = tool_runs("scan-1", &runs, &catalog());

        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].adapter, "cookies");
        assert_eq!(recorded[0].test_id.as_deref(), Some("cookies"));
        assert_eq!(recorded[0].outcome, ToolOutcome::Succeeded);
        assert_eq!(recorded[1].adapter, "privacy-policy");
        assert_eq!(recorded[1].tool, "cookies");
        assert_eq!(recorded[1].test_id.as_deref(), Some("privacy-policy"));
        assert_eq!(recorded[1].reason.as_deref(), Some("HTTP 502"));
        assert!(recorded.iter().all(|r| r.scan_id == "scan-1"));
    }

    #[tokio::test]
    async fn test_panicked_adapter_is_failed_even_when_names_collide() {
        let store = Arc::new(InMemoryGraphStore::new());
        let (scan, _) = store.upsert_scan(Scan::new("https://example.com/")).await.unwrap();
        let ingestor = Arc::new(Ingestor::new(store, Arc::new(catalog())));
        let adapters: Vec<Arc<dyn ScannerAdapter>> = vec![
            Arc::new(Twin { panics: false }),
            Arc::new(Twin { panics: true }),
        ];

        let runs = execute_adapters(
            &adapters,
            ingestor,
            &scan.id,
            &scan.target,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(runs.len(), 2);
        let mut outcomes: Vec<_> = runs.iter().map(|r| (r.outcome, r.reason.clone())).collect();
        outcomes.sort_by_key(|(outcome, _)| outcome.is_error());
        assert_eq!(outcomes[0], (ToolOutcome::Succeeded, None));
        assert_eq!(
            outcomes[1],
            (ToolOutcome::Failed, Some("adapter task aborted".to_string()))
        );
    }
}
