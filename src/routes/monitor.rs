//! Scan monitoring routes: attach and detach the status poller for a scan
//! job, and drain the event stream it produces.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;

use crate::errors::ApiResponse;
use crate::services::poller::ScanEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MonitorStatus {
    pub job_ref: String,
    pub monitoring: bool,
}

/// POST /api/v1/scans/{scan_id}/monitor — start monitoring a scan job.
/// Restarting an already-monitored job replaces its schedule.
pub async fn start(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> Json<ApiResponse<MonitorStatus>> {
    state.poller.start_monitoring(&scan_id).await;
    ApiResponse::success(MonitorStatus {
        job_ref: scan_id,
        monitoring: true,
    })
}

/// DELETE /api/v1/scans/{scan_id}/monitor — stop monitoring a scan job.
/// Once this returns, no further event for the job will be delivered.
pub async fn stop(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> Json<ApiResponse<MonitorStatus>> {
    state.poller.cancel(&scan_id).await;
    ApiResponse::success(MonitorStatus {
        job_ref: scan_id,
        monitoring: false,
    })
}

/// GET /api/v1/scans/events — drain every retained event since the last
/// drain. Non-blocking; an empty list means no news. The backlog is a
/// bounded ring, so a long-unpolled stream loses its oldest events.
pub async fn events(State(state): State<AppState>) -> Json<ApiResponse<Vec<ScanEvent>>> {
    let mut receiver = state.events.lock().await;
    let mut drained = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => drained.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Scan event backlog overflowed, oldest events dropped");
            }
            Err(_) => break,
        }
    }
    ApiResponse::success(drained)
}
