//! Scanner routes: bulk create+scan, dashboard summary, connection test,
//! runtime configuration, and asset selection.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::ScannerConfig;
use crate::errors::{ApiResponse, AppError};
use crate::gateway::{HttpScanGateway, ScanGateway};
use crate::models::asset::DiscoveredAsset;
use crate::models::target::TargetSpec;
use crate::services::dashboard::{self, DashboardSummary};
use crate::services::orchestrator::{BulkOperationResult, BulkOrchestrator};
use crate::services::selection::{
    self, QuickSelect, SortDirection, SortKey, StatusClass,
};
use crate::services::CancelFlag;
use crate::AppState;

/// Request body for the bulk scan operation. `targets` is raw multiline
/// input; each line is normalized into a target address, blank lines and
/// duplicates are dropped.
#[derive(Debug, Deserialize)]
pub struct BulkScanRequest {
    pub targets: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/v1/scanner/bulk — create a target and start a scan for every
/// address in the request.
pub async fn bulk_scan(
    State(state): State<AppState>,
    Json(body): Json<BulkScanRequest>,
) -> Result<Json<ApiResponse<BulkOperationResult>>, AppError> {
    let description = body.description.as_deref().unwrap_or("Bulk scan");
    let specs = TargetSpec::parse_lines(&body.targets, description);
    if specs.is_empty() {
        return Err(AppError::Validation(
            "no valid target addresses in request".to_string(),
        ));
    }

    let config = state.scanner.read().await.clone();
    let gateway: Arc<dyn ScanGateway> = Arc::new(HttpScanGateway::new(&config)?);
    let orchestrator = BulkOrchestrator::new(gateway, config);
    let result = orchestrator.run(specs, &CancelFlag::new()).await;

    Ok(ApiResponse::success(result))
}

/// GET /api/v1/scanner/dashboard — aggregate counts over targets, scans and
/// vulnerabilities.
pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, AppError> {
    let config = state.scanner.read().await.clone();
    let gateway: Arc<dyn ScanGateway> = Arc::new(HttpScanGateway::new(&config)?);
    Ok(ApiResponse::success(dashboard::load(gateway).await))
}

/// Credentials to probe, independent of the stored configuration.
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub reachable: bool,
    pub authorized: bool,
}

/// POST /api/v1/scanner/test-connection — probe the Scan Service with the
/// supplied credentials without persisting them.
pub async fn test_connection(
    State(state): State<AppState>,
    Json(body): Json<TestConnectionRequest>,
) -> Result<Json<ApiResponse<TestConnectionResponse>>, AppError> {
    let config = state.scanner.read().await.clone();
    let gateway = HttpScanGateway::new(&config)?;

    let response = match gateway.test_credentials(&body.api_url, &body.api_key).await {
        Ok(authorized) => TestConnectionResponse {
            reachable: true,
            authorized,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Connection test failed");
            TestConnectionResponse {
                reachable: false,
                authorized: false,
            }
        }
    };

    Ok(ApiResponse::success(response))
}

/// GET /api/v1/scanner/config — current scanner settings, API key redacted.
pub async fn get_config(State(state): State<AppState>) -> Json<ApiResponse<ScannerConfig>> {
    let mut config = state.scanner.read().await.clone();
    if !config.api_key.is_empty() {
        config.api_key = "********".to_string();
    }
    ApiResponse::success(config)
}

/// PUT /api/v1/scanner/config — replace the scanner settings. Out-of-range
/// values are rejected; subsequent operations pick the new settings up.
pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<ScannerConfig>,
) -> Result<Json<ApiResponse<ScannerConfig>>, AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut current = state.scanner.write().await;
    *current = body;

    let mut echoed = current.clone();
    if !echoed.api_key.is_empty() {
        echoed.api_key = "********".to_string();
    }
    Ok(ApiResponse::success(echoed))
}

/// Request body for asset selection: the asset list plus the filter, sort
/// and quick-select parameters to apply to it.
#[derive(Debug, Deserialize)]
pub struct SelectAssetsRequest {
    pub assets: Vec<DiscoveredAsset>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub status_class: StatusClass,
    #[serde(default)]
    pub sort_key: Option<SortKey>,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub quick_select: Option<QuickSelect>,
}

#[derive(Debug, Serialize)]
pub struct SelectAssetsResponse {
    pub assets: Vec<DiscoveredAsset>,
    pub selected_ids: Vec<u64>,
}

/// POST /api/v1/assets/select — filter and sort discovered assets, then
/// resolve the selected id set (quick-select group, or the whole subset).
pub async fn select_assets(
    Json(body): Json<SelectAssetsRequest>,
) -> Json<ApiResponse<SelectAssetsResponse>> {
    let mut subset = selection::filter(&body.assets, &body.query, body.status_class);
    if let Some(key) = body.sort_key {
        subset = selection::sort(subset, key, body.direction);
    }

    let selected_ids = match body.quick_select {
        Some(which) => selection::quick_select(&subset, which),
        None => selection::select_all(&subset),
    };

    ApiResponse::success(SelectAssetsResponse {
        assets: subset,
        selected_ids,
    })
}
