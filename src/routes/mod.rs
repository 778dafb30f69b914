//! Route definitions for the ScanBridge API.

pub mod health;
pub mod monitor;
pub mod scanner;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Assemble the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scanner/bulk", post(scanner::bulk_scan))
        .route("/scanner/dashboard", get(scanner::dashboard))
        .route("/scanner/test-connection", post(scanner::test_connection))
        .route(
            "/scanner/config",
            get(scanner::get_config).put(scanner::update_config),
        )
        .route("/assets/select", post(scanner::select_assets))
        .route(
            "/scans/{scan_id}/monitor",
            post(monitor::start).delete(monitor::stop),
        )
        .route("/scans/events", get(monitor::events));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
