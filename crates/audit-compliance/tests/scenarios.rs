//! End-to-end scan scenarios against the built-in ontology

use async_trait::async_trait;
use audit_compliance::frameworks::builtin_seed;
use audit_compliance::reporting::{Report, ViolationKind};
use audit_compliance::*;
use audit_graph::{
    FindingWrite, GraphStore, InMemoryGraphStore, OntologySnapshot, Regulation, Requirement, Rule,
    Scan, ScanGraph, StoreError, StoreResult, Test, ToolOutcome, ToolRun, UpsertOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct FixedAdapter {
    tool: ToolKind,
    output: Value,
}

#[async_trait]
impl ScannerAdapter for FixedAdapter {
    fn tool(&self) -> ToolKind {
        self.tool
    }

    fn name(&self) -> &str {
        self.tool.as_str()
    }

    async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
        Ok(RawOutput::Json(self.output.clone()))
    }
}

struct SlowAdapter(ToolKind);

#[async_trait]
impl ScannerAdapter for SlowAdapter {
    fn tool(&self) -> ToolKind {
        self.0
    }

    fn name(&self) -> &str {
        "slow"
    }

    async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(RawOutput::Json(json!({})))
    }
}

struct FailingAdapter(ToolKind);

#[async_trait]
impl ScannerAdapter for FailingAdapter {
    fn tool(&self) -> ToolKind {
        self.0
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
        Err(AdapterError::Failed("connection refused".into()))
    }
}

/// Policy checker sharing the cookies tool that cannot reach its backend
struct PolicyDown;

#[async_trait]
impl ScannerAdapter for PolicyDown {
    fn tool(&self) -> ToolKind {
        ToolKind::Cookies
    }

    fn name(&self) -> &str {
        "privacy-policy"
    }

    fn test_ref(&self) -> TestRef {
        TestRef::PolicyCheck("privacy-policy".into())
    }

    async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
        Err(AdapterError::Failed("HTTP 502".into()))
    }
}

/// Reports a distinct endpoint per target host
struct EchoTls;

#[async_trait]
impl ScannerAdapter for EchoTls {
    fn tool(&self) -> ToolKind {
        ToolKind::Ssl
    }

    fn name(&self) -> &str {
        "echo-tls"
    }

    async fn run_scan(&self, target: &str) -> Result<RawOutput, AdapterError> {
        tokio::task::yield_now().await;
        let (host, ip) = if target.contains("one.example") {
            ("one.example", "10.0.0.1")
        } else {
            ("two.example", "10.0.0.2")
        };
        Ok(RawOutput::Json(json!({
            "host": host,
            "endpoints": [{ "ipAddress": ip, "grade": "B" }]
        })))
    }
}

/// In-memory store whose finding writes fail
struct BrokenFindingStore(InMemoryGraphStore);

#[async_trait]
impl GraphStore for BrokenFindingStore {
    async fn upsert_regulation(&self, regulation: Regulation) -> StoreResult<UpsertOutcome> {
        self.0.upsert_regulation(regulation).await
    }

    async fn upsert_rule(&self, rule: Rule) -> StoreResult<UpsertOutcome> {
        self.0.upsert_rule(rule).await
    }

    async fn upsert_requirement(&self, requirement: Requirement) -> StoreResult<UpsertOutcome> {
        self.0.upsert_requirement(requirement).await
    }

    async fn upsert_test(&self, test: Test) -> StoreResult<UpsertOutcome> {
        self.0.upsert_test(test).await
    }

    async fn link_part_of(&self, requirement_id: &str, rule_id: &str) -> StoreResult<bool> {
        self.0.link_part_of(requirement_id, rule_id).await
    }

    async fn link_tested_by(&self, requirement_id: &str, test_id: &str) -> StoreResult<bool> {
        self.0.link_tested_by(requirement_id, test_id).await
    }

    async fn ontology(&self) -> StoreResult<OntologySnapshot> {
        self.0.ontology().await
    }

    async fn count_tests(&self) -> StoreResult<usize> {
        self.0.count_tests().await
    }

    async fn upsert_scan(&self, scan: Scan) -> StoreResult<(Scan, UpsertOutcome)> {
        self.0.upsert_scan(scan).await
    }

    async fn get_scan(&self, scan_id: &str) -> StoreResult<Option<Scan>> {
        self.0.get_scan(scan_id).await
    }

    async fn upsert_finding(&self, _write: FindingWrite) -> StoreResult<UpsertOutcome> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn link_match(
        &self,
        scan_id: &str,
        finding_id: &str,
        requirement_id: &str,
        reason: Option<String>,
    ) -> StoreResult<bool> {
        self.0.link_match(scan_id, finding_id, requirement_id, reason).await
    }

    async fn record_tool_run(&self, run: ToolRun) -> StoreResult<()> {
        self.0.record_tool_run(run).await
    }

    async fn scan_graph(&self, scan_id: &str) -> StoreResult<ScanGraph> {
        self.0.scan_graph(scan_id).await
    }
}

async fn engine_with(config: EngineConfig) -> (Arc<InMemoryGraphStore>, ComplianceEngine) {
    let store = Arc::new(InMemoryGraphStore::new());
    let engine = ComplianceEngine::new(store.clone(), config);
    engine.seed(builtin_seed()).await.unwrap();
    (store, engine)
}

fn fixed(tool: ToolKind, output: Value) -> Arc<dyn ScannerAdapter> {
    Arc::new(FixedAdapter { tool, output })
}

fn status_of<'a>(report: &'a Report, requirement: &str) -> &'a reporting::RequirementStatus {
    report
        .requirement_statuses
        .iter()
        .find(|s| s.requirement_id == requirement)
        .unwrap()
}

fn ssl_payload(grade: &str) -> Value {
    json!({
        "host": "example.com",
        "status": "READY",
        "endpoints": [{ "ipAddress": "93.184.216.34", "grade": grade }]
    })
}

#[tokio::test]
async fn test_clean_scan_all_pass() {
    let (_, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Axe, json!({ "violations": [] })));

    let result = engine.run_scan("example.com").await.unwrap();
    let report = result.report;

    assert_eq!(report.target, "https://example.com/");
    assert_eq!(report.summary.total_failures, 0);
    assert!(report.violations.is_empty());
    assert!(report.requirement_statuses.iter().all(|s| s.status == Status::Pass));
    assert!(report.tests.iter().all(|t| t.status == Status::Pass));
    assert!(report.summary.regulation_breakdown.values().all(|b| b.failures == 0));
    assert_eq!(report.summary.total_tests, engine.index().tests.len());
}

#[tokio::test]
async fn test_axe_nodes_on_one_rule_fail_once() {
    let (_, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(
        ToolKind::Axe,
        json!({
            "violations": [{
                "id": "image-alt",
                "impact": "critical",
                "help": "Images must have alternate text",
                "nodes": [{ "target": ["#logo"] }, { "target": ["#hero"] }]
            }]
        }),
    ));

    let report = engine.run_scan("https://example.com").await.unwrap().report;

    let alt = status_of(&report, "req-text-alternatives");
    assert_eq!(alt.status, Status::Fail);
    assert_eq!(alt.failure_count, 2);
    assert_eq!(report.summary.total_failures, 1);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].findings.len(), 2);
    assert_eq!(report.summary.regulation_breakdown["wcag-2.1"].failures, 1);
    assert_eq!(status_of(&report, "req-accessibility-general").status, Status::Pass);
}

#[tokio::test]
async fn test_tls_grade_b_fails_and_grade_a_passes() {
    let (store, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Ssl, ssl_payload("B")));

    let result = engine.run_scan("https://example.com").await.unwrap();

    assert_eq!(status_of(&result.report, "req-transport-encryption").status, Status::Fail);
    let graph = store.scan_graph(&result.scan_id).await.unwrap();
    assert_eq!(graph.findings[0].finding.id, "ssl:93.184.216.34");
    assert_eq!(graph.findings[0].finding.test_id, "ssl-labs");

    let (_, clean) = engine_with(EngineConfig::default()).await;
    clean.register_adapter(fixed(ToolKind::Ssl, ssl_payload("A+")));
    let report = clean.run_scan("https://example.com").await.unwrap().report;
    assert_eq!(status_of(&report, "req-transport-encryption").status, Status::Pass);
}

#[tokio::test(start_paused = true)]
async fn test_headers_timeout_is_isolated() {
    let mut config = EngineConfig::default();
    config.pipeline.tool_timeouts.insert("headers".into(), 5);
    let (store, engine) = engine_with(config).await;
    engine.register_adapter(Arc::new(SlowAdapter(ToolKind::Headers)));
    engine.register_adapter(fixed(ToolKind::Ssl, ssl_payload("B")));

    let result = engine.run_scan("https://example.com").await.unwrap();
    let report = &result.report;

    let headers = report.tests.iter().find(|t| t.test_id == "curl-headers").unwrap();
    assert_eq!(headers.status, Status::Error);
    assert_eq!(headers.error.as_deref(), Some("timed out after 5s"));

    // the SSL finding is unaffected and the failure is not counted
    assert_eq!(report.summary.total_failures, 1);
    assert_eq!(status_of(report, "req-security-headers").status, Status::Pass);
    let synthetic: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::ExecutionFailure)
        .collect();
    assert_eq!(synthetic.len(), 1);
    assert_eq!(synthetic[0].tool.as_deref(), Some("headers"));

    let graph = store.scan_graph(&result.scan_id).await.unwrap();
    let run = graph.tool_runs.iter().find(|r| r.tool == "headers").unwrap();
    assert_eq!(run.outcome, ToolOutcome::Failed);
}

#[tokio::test]
async fn test_requirement_under_two_rules_counted_once() {
    let (_, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Ssl, ssl_payload("C")));

    let report = engine.run_scan("https://example.com").await.unwrap().report;

    let violation = report
        .violations
        .iter()
        .find(|v| v.requirement.id == "req-transport-encryption")
        .unwrap();
    assert_eq!(violation.rules.len(), 2);
    assert_eq!(report.summary.regulation_breakdown["gdpr"].failures, 1);
    assert!(report.summary.regulation_breakdown["gdpr"].failures <= report.summary.total_failures);
}

#[tokio::test]
async fn test_failed_and_malformed_adapters_leave_others_intact() {
    let (store, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(Arc::new(FailingAdapter(ToolKind::Nikto)));
    engine.register_adapter(fixed(ToolKind::Ssl, json!("not a report")));
    engine.register_adapter(fixed(
        ToolKind::Axe,
        json!({ "violations": [{ "id": "html-has-lang", "nodes": [{ "target": ["html"] }] }] }),
    ));

    let result = engine.run_scan("https://example.com").await.unwrap();
    let report = &result.report;

    assert_eq!(status_of(report, "req-page-language").status, Status::Fail);
    let nikto = report.tests.iter().find(|t| t.test_id == "nikto").unwrap();
    assert_eq!(nikto.status, Status::Error);
    assert_eq!(nikto.error.as_deref(), Some("connection refused"));
    let ssl = report.tests.iter().find(|t| t.test_id == "ssl-labs").unwrap();
    assert_eq!(ssl.status, Status::Error);

    let graph = store.scan_graph(&result.scan_id).await.unwrap();
    let ssl_run = graph.tool_runs.iter().find(|r| r.tool == "ssl").unwrap();
    assert_eq!(ssl_run.outcome, ToolOutcome::Malformed);
}

#[tokio::test]
async fn test_rerendered_report_is_identical() {
    let (_, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Ssl, ssl_payload("B")));
    engine.register_adapter(Arc::new(FailingAdapter(ToolKind::Headers)));

    let result = engine.run_scan("https://example.com").await.unwrap();
    let again = engine.build_report(&result.scan_id).await.unwrap();

    assert_eq!(
        serde_json::to_string(&result.report).unwrap(),
        serde_json::to_string(&again).unwrap()
    );
}

#[tokio::test]
async fn test_reingesting_keeps_finding_ids() {
    let (store, engine) = engine_with(EngineConfig::default()).await;
    let scan = engine.start_scan("https://example.com").await.unwrap();

    for _ in 0..2 {
        engine
            .ingest(&scan.id, ToolKind::Ssl, RawOutput::Json(ssl_payload("B")), &scan.target)
            .await
            .unwrap();
    }
    engine.map_scan(&scan.id).await.unwrap();

    let graph = store.scan_graph(&scan.id).await.unwrap();
    assert_eq!(graph.findings.len(), 1);
    assert_eq!(graph.findings[0].finding.version, 2);
    let report = engine.build_report(&scan.id).await.unwrap();
    assert_eq!(status_of(&report, "req-transport-encryption").failure_count, 1);
}

fn cookie_payload() -> Value {
    json!({ "cookies": [{ "name": "track", "setBeforeConsent": true, "secure": false }] })
}

#[tokio::test]
async fn test_policy_failure_leaves_cookie_findings_failing() {
    let (store, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Cookies, cookie_payload()));
    engine.register_adapter(Arc::new(PolicyDown));

    let result = engine.run_scan("https://example.com").await.unwrap();
    let report = &result.report;

    let cookies = report.tests.iter().find(|t| t.test_id == "cookies").unwrap();
    assert_eq!(cookies.status, Status::Fail);
    assert!(cookies.failure_count > 0);
    assert!(cookies.error.is_none());

    let policy = report.tests.iter().find(|t| t.test_id == "privacy-policy").unwrap();
    assert_eq!(policy.status, Status::Error);
    assert_eq!(policy.error.as_deref(), Some("HTTP 502"));
    assert_eq!(status_of(report, "req-cookie-consent").status, Status::Fail);

    let graph = store.scan_graph(&result.scan_id).await.unwrap();
    let runs: Vec<_> = graph
        .tool_runs
        .iter()
        .map(|r| (r.adapter.as_str(), r.outcome))
        .collect();
    assert_eq!(
        runs,
        vec![("cookies", ToolOutcome::Succeeded), ("privacy-policy", ToolOutcome::Failed)]
    );
}

#[tokio::test]
async fn test_failing_sibling_on_same_test_keeps_fail() {
    let (_, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(fixed(ToolKind::Cookies, cookie_payload()));
    engine.register_adapter(Arc::new(FailingAdapter(ToolKind::Cookies)));

    let report = engine.run_scan("https://example.com").await.unwrap().report;

    let cookies = report.tests.iter().find(|t| t.test_id == "cookies").unwrap();
    assert_eq!(cookies.status, Status::Fail);
    assert_eq!(cookies.error.as_deref(), Some("connection refused"));
    let synthetic = report
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::ExecutionFailure)
        .count();
    assert_eq!(synthetic, 1);
}

#[tokio::test]
async fn test_concurrent_scans_stay_isolated() {
    let (store, engine) = engine_with(EngineConfig::default()).await;
    engine.register_adapter(Arc::new(EchoTls));
    engine.register_adapter(Arc::new(FailingAdapter(ToolKind::Nikto)));

    let (one, two) = tokio::join!(
        engine.run_scan("https://one.example"),
        engine.run_scan("https://two.example")
    );
    let (one, two) = (one.unwrap(), two.unwrap());
    assert_ne!(one.scan_id, two.scan_id);

    for (result, ip) in [(&one, "10.0.0.1"), (&two, "10.0.0.2")] {
        assert_eq!(result.report.scan_id, result.scan_id);
        let graph = store.scan_graph(&result.scan_id).await.unwrap();
        let ids: Vec<_> = graph.findings.iter().map(|f| f.finding.id.as_str()).collect();
        assert_eq!(ids, vec![format!("ssl:{}", ip)]);
        assert!(graph.findings.iter().all(|f| f.finding.scan_id == result.scan_id));
        assert_eq!(graph.tool_runs.len(), 2);
        assert!(graph.tool_runs.iter().all(|r| r.scan_id == result.scan_id));

        let tls = result
            .report
            .violations
            .iter()
            .find(|v| v.requirement.id == "req-transport-encryption")
            .unwrap();
        assert_eq!(tls.findings.len(), 1);
        assert_eq!(tls.findings[0].finding_id, format!("ssl:{}", ip));
    }
}

#[tokio::test]
async fn test_store_failure_mid_scan_aborts_with_store_error() {
    let store = Arc::new(BrokenFindingStore(InMemoryGraphStore::new()));
    let engine = ComplianceEngine::new(store, EngineConfig::default());
    engine.seed(builtin_seed()).await.unwrap();
    engine.register_adapter(fixed(ToolKind::Ssl, ssl_payload("B")));

    let err = engine.run_scan("https://example.com").await.unwrap_err();

    assert!(matches!(err, ComplianceError::Store(StoreError::Storage(_))), "{:?}", err);
}
