//! Health check endpoints for liveness and readiness probes.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::ApiResponse;
use crate::gateway::{HttpScanGateway, ScanGateway};
use crate::AppState;

/// Readiness probe detail.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub scanner: String,
}

/// Liveness probe — always returns OK if the process is running.
pub async fn live() -> &'static str {
    "OK"
}

/// Readiness probe — checks Scan Service connectivity with the configured
/// credentials.
pub async fn ready(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let config = state.scanner.read().await.clone();

    let scanner_status = match HttpScanGateway::new(&config) {
        Ok(gateway) => match gateway.test_credentials(&config.api_url, &config.api_key).await {
            Ok(true) => "connected".to_string(),
            Ok(false) => "unauthorized".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Scan Service health check failed");
                format!("error: {e}")
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Scan Service client creation failed");
            format!("error: {e}")
        }
    };

    ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        scanner: scanner_status,
    })
}
