//! HTTP surface tests

use async_trait::async_trait;
use audit_api::{build_router, ApiState};
use audit_compliance::frameworks::builtin_seed;
use audit_compliance::{
    AdapterError, ComplianceEngine, EngineConfig, RawOutput, ScannerAdapter, ToolKind,
};
use audit_graph::{
    FindingWrite, GraphStore, InMemoryGraphStore, OntologySnapshot, Regulation, Requirement, Rule,
    Scan, ScanGraph, StoreError, StoreResult, Test, ToolRun, UpsertOutcome,
};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;

struct TlsGradeB;

#[async_trait]
impl ScannerAdapter for TlsGradeB {
    fn tool(&self) -> ToolKind {
        ToolKind::Ssl
    }

    fn name(&self) -> &str {
        "ssl-labs"
    }

    async fn run_scan(&self, _target: &str) -> Result<RawOutput, AdapterError> {
        Ok(RawOutput::Json(json!({
            "host": "example.com",
            "endpoints": [{ "ipAddress": "93.184.216.34", "grade": "B" }]
        })))
    }
}

/// Finding writes fail, everything else hits memory
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
        Err(StoreError::Storage("connection reset".into()))
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

async fn server() -> TestServer {
    let engine = ComplianceEngine::new(Arc::new(InMemoryGraphStore::new()), EngineConfig::default());
    engine.seed(builtin_seed()).await.unwrap();
    engine.register_adapter(Arc::new(TlsGradeB));
    TestServer::new(build_router(ApiState::new(Arc::new(engine)))).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_post_scan_returns_report() {
    let server = server().await;

    let response = server.post("/scan").json(&json!({ "target": "example.com" })).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["scanId"].is_string());
    assert_eq!(body["report"]["target"], "https://example.com/");
    assert_eq!(body["report"]["summary"]["totalFailures"], 1);
    assert_eq!(body["report"]["summary"]["regulationBreakdown"]["gdpr"]["failures"], 1);
}

#[tokio::test]
async fn test_report_can_be_fetched_again() {
    let server = server().await;
    let created: Value = server
        .post("/scan")
        .json(&json!({ "target": "https://example.com" }))
        .await
        .json();
    let scan_id = created["scanId"].as_str().unwrap();

    let response = server.get(&format!("/scan/{}/report", scan_id)).await;

    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report, created["report"]);
}

#[tokio::test]
async fn test_legacy_query_scan() {
    let server = server().await;
    let response = server.get("/scan").add_query_param("url", "example.com").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["report"]["scanId"], body["scanId"]);
}

#[tokio::test]
async fn test_missing_or_invalid_target_is_400() {
    let server = server().await;

    let missing = server.post("/scan").json(&json!({})).await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    assert!(missing.json::<Value>()["error"].is_string());

    let invalid = server.post("/scan").json(&json!({ "target": "ftp://example.com" })).await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

    let legacy = server.get("/scan").await;
    assert_eq!(legacy.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_scan_is_404() {
    let server = server().await;
    let response = server.get("/scan/does-not-exist/report").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("does-not-exist"));
}

#[tokio::test]
async fn test_openapi_document() {
    let server = server().await;
    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert!(doc["paths"]["/scan"].is_object());
    assert!(doc["paths"]["/scan/{scan_id}/report"].is_object());
}

#[tokio::test]
async fn test_store_failure_is_500() {
    let store = Arc::new(BrokenFindingStore(InMemoryGraphStore::new()));
    let engine = ComplianceEngine::new(store, EngineConfig::default());
    engine.seed(builtin_seed()).await.unwrap();
    engine.register_adapter(Arc::new(TlsGradeB));
    let server = TestServer::new(build_router(ApiState::new(Arc::new(engine)))).unwrap();

    let response = server.post("/scan").json(&json!({ "target": "example.com" })).await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("connection reset"));
}
