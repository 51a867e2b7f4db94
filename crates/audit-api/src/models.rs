//! API Models

use audit_compliance::reporting::Report;
use audit_compliance::{ComplianceError, ScanResult};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Scan submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// URL or bare host; `https://` is assumed
    pub target: Option<String>,
}

/// `GET /scan?url=...`
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LegacyScanQuery {
    /// URL or bare host to scan
    pub url: Option<String>,
}

/// Completed scan
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    /// Id of the created Scan
    pub scan_id: String,
    /// Report rendered when the scan finished
    pub report: Report,
}

impl From<ScanResult> for ScanResponse {
    fn from(result: ScanResult) -> Self {
        Self {
            scan_id: result.scan_id,
            report: result.report,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
}

/// Handler error mapped onto an HTTP status
#[derive(Debug)]
pub struct ApiError(pub ComplianceError);

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ComplianceError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ComplianceError::ScanNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_graph::StoreError;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError(ComplianceError::InvalidTarget("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ComplianceError::ScanNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(ComplianceError::Store(StoreError::Storage("down".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
