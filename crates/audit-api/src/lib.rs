//! AutoAudit HTTP API
//!
//! Scan submission and report retrieval over REST.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           AUDIT SERVER                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         REST API                                 │   │
//! │  │  POST /scan | GET /scan?url= | GET /scan/{id}/report | OpenAPI   │   │
//! │  └────────────────────────────────┬────────────────────────────────┘   │
//! │                                   │                                     │
//! │  ┌────────────────────────────────▼────────────────────────────────┐   │
//! │  │                      COMPLIANCE ENGINE                           │   │
//! │  │   Adapters | Ingestion | Correlation | Report Aggregation        │   │
//! │  └────────────────────────────────┬────────────────────────────────┘   │
//! │                                   │                                     │
//! │  ┌────────────────────────────────▼────────────────────────────────┐   │
//! │  │                 GRAPH STORE (in-memory + snapshot)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

/// Server configuration
pub mod config;
/// Request and response bodies
pub mod models;
/// HTTP handlers
pub mod routes;

use audit_compliance::reporting;
use audit_compliance::ComplianceEngine;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use config::{AppConfig, ConfigError};
pub use models::*;

/// API state
#[derive(Clone)]
pub struct ApiState {
    /// Engine shared by every handler
    pub engine: Arc<ComplianceEngine>,
}

impl ApiState {
    /// Wrap an engine
    pub fn new(engine: Arc<ComplianceEngine>) -> Self {
        Self { engine }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AutoAudit API",
        version = "0.1.0",
        description = "Automated website compliance scanning against GDPR, ePrivacy and WCAG",
        license(name = "Apache-2.0")
    ),
    paths(
        routes::health::health_check,
        routes::scans::create_scan,
        routes::scans::legacy_scan,
        routes::scans::get_report,
    ),
    components(
        schemas(
            ScanRequest, ScanResponse, ErrorBody,
            reporting::Report, reporting::ReportSummary, reporting::RegulationBreakdown,
            reporting::RequirementStatus, reporting::Status,
            reporting::Violation, reporting::ViolationKind, reporting::RequirementSummary,
            reporting::RuleRef, reporting::RegulationRef,
            reporting::FindingRef, reporting::EvidenceRef,
            reporting::TestStatus
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "scans", description = "Compliance scans and reports")
    )
)]
pub struct ApiDoc;

/// Build the API router
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(routes::scans::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(state))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
