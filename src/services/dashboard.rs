//! Dashboard aggregator: derives summary counts from the Scan Service list
//! endpoints. The reduction itself is a pure function over already-fetched
//! records; a failed fetch degrades that list's contribution to zero instead
//! of failing the dashboard.

use std::sync::Arc;

use serde::Serialize;

use crate::gateway::ScanGateway;
use crate::models::scan::{ScanRecord, ScanStatus, TargetRecord, VulnerabilityRecord};

/// Vulnerability counts per severity band.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub info: u64,
}

/// Aggregate counts shown on the dashboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DashboardSummary {
    pub total_targets: u64,
    pub active_scans: u64,
    pub completed_scans: u64,
    pub total_vulnerabilities: u64,
    pub severity_counts: SeverityCounts,
}

/// Reduce the three record lists into the dashboard summary.
///
/// A scan counts as active when its status parses to a non-terminal state;
/// scans with a missing or unrecognized status count as neither active nor
/// completed. Vulnerabilities with an unknown or missing severity fall into
/// the info band.
pub fn summarize(
    targets: &[TargetRecord],
    scans: &[ScanRecord],
    vulnerabilities: &[VulnerabilityRecord],
) -> DashboardSummary {
    let mut active_scans = 0;
    let mut completed_scans = 0;
    for scan in scans {
        match scan.status() {
            Some(status) if !status.is_terminal() => active_scans += 1,
            Some(ScanStatus::Completed) => completed_scans += 1,
            _ => {}
        }
    }

    let mut severity_counts = SeverityCounts::default();
    for vuln in vulnerabilities {
        let severity = vuln
            .severity
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match severity.as_str() {
            "critical" => severity_counts.critical += 1,
            "high" => severity_counts.high += 1,
            "medium" => severity_counts.medium += 1,
            "low" => severity_counts.low += 1,
            _ => severity_counts.info += 1,
        }
    }

    DashboardSummary {
        total_targets: targets.len() as u64,
        active_scans,
        completed_scans,
        total_vulnerabilities: vulnerabilities.len() as u64,
        severity_counts,
    }
}

/// Fetch all three lists and summarize. Each fetch failure is logged and
/// treated as an empty list so one bad endpoint never blanks the dashboard.
pub async fn load(gateway: Arc<dyn ScanGateway>) -> DashboardSummary {
    let targets = gateway.list_targets().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to list targets for dashboard");
        Vec::new()
    });
    let scans = gateway.list_scans().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to list scans for dashboard");
        Vec::new()
    });
    let vulnerabilities = gateway.list_vulnerabilities().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to list vulnerabilities for dashboard");
        Vec::new()
    });

    summarize(&targets, &scans, &vulnerabilities)
}
