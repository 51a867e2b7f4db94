//! Scan endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use audit_compliance::reporting::Report;
use audit_compliance::ComplianceError;
use std::sync::Arc;
use tracing::info;

use crate::{models::*, ApiState};

/// Scan routes
pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/scan", get(legacy_scan).post(create_scan))
        .route("/scan/:scan_id/report", get(get_report))
}

/// Run a scan
#[utoipa::path(
    post,
    path = "/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan completed", body = ScanResponse),
        (status = 400, description = "Missing or invalid target", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "scans"
)]
pub async fn create_scan(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let target = body
        .map_err(|e| ComplianceError::InvalidTarget(e.body_text()))?
        .0
        .target;
    run(&state, target).await
}

/// Run a scan (legacy query form)
#[utoipa::path(
    get,
    path = "/scan",
    params(LegacyScanQuery),
    responses(
        (status = 200, description = "Scan completed", body = ScanResponse),
        (status = 400, description = "Missing or invalid url", body = ErrorBody)
    ),
    tag = "scans"
)]
pub async fn legacy_scan(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<LegacyScanQuery>,
) -> Result<Json<ScanResponse>, ApiError> {
    run(&state, query.url).await
}

/// Re-render the report of an existing scan
#[utoipa::path(
    get,
    path = "/scan/{scan_id}/report",
    params(("scan_id" = String, Path,)),
    responses(
        (status = 200, description = "Compliance report", body = Report),
        (status = 404, description = "Unknown scan", body = ErrorBody)
    ),
    tag = "scans"
)]
pub async fn get_report(
    State(state): State<Arc<ApiState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    Ok(Json(state.engine.build_report(&scan_id).await?))
}

async fn run(state: &ApiState, target: Option<String>) -> Result<Json<ScanResponse>, ApiError> {
    let target = target
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ComplianceError::InvalidTarget("target is required".into()))?;
    info!("Scan requested for {}", target);
    let result = state.engine.run_scan(&target).await?;
    Ok(Json(result.into()))
}
