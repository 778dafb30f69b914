//! Remote Scan Gateway: the Scan Service's capability set.
//!
//! The core treats the scanner as a set of capabilities, not a concrete
//! protocol; everything downstream (orchestrator, poller, dashboard) works
//! against this trait so it can be exercised with an in-memory double.

pub mod http;

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::models::scan::{ScanJob, ScanRecord, TargetRecord, VulnerabilityRecord};

pub use http::HttpScanGateway;

/// Capability set exposed by the Scan Service.
#[async_trait]
pub trait ScanGateway: Send + Sync {
    /// Register a target, returning its identifier.
    async fn create_target(
        &self,
        address: &str,
        description: &str,
    ) -> Result<String, GatewayError>;

    /// Start a scan for an existing target, returning the job identifier.
    async fn start_scan(
        &self,
        target_id: &str,
        profile_id: &str,
    ) -> Result<String, GatewayError>;

    /// Fetch the current lifecycle record of a scan job.
    async fn scan_status(&self, job_id: &str) -> Result<ScanJob, GatewayError>;

    async fn list_targets(&self) -> Result<Vec<TargetRecord>, GatewayError>;

    async fn list_scans(&self) -> Result<Vec<ScanRecord>, GatewayError>;

    async fn list_vulnerabilities(&self) -> Result<Vec<VulnerabilityRecord>, GatewayError>;

    /// Check whether the given API endpoint and key are usable.
    async fn test_credentials(&self, url: &str, key: &str) -> Result<bool, GatewayError>;
}
