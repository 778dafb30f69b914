//! Scan job lifecycle model and the lenient read models returned by the
//! Scan Service list endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scan job on the Scan Service.
///
/// Transitions are monotonic toward the terminal set; no transition is
/// defined out of a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    Starting,
    Processing,
    Completed,
    Failed,
    Stopped,
    Aborted,
}

impl ScanStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Stopped | Self::Aborted
        )
    }

    /// Parse a status string as reported by the Scan Service,
    /// case-insensitively. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "starting" => Some(Self::Starting),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Position in the Queued → Starting → Processing → Terminal ordering.
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Starting => 1,
            Self::Processing => 2,
            Self::Completed | Self::Failed | Self::Stopped | Self::Aborted => 3,
        }
    }

    /// Check whether a status transition is valid per the state machine.
    ///
    /// Queued → Starting → Processing → {Completed, Failed, Stopped,
    /// Aborted}. Observed sequences may skip states (a fast scan can go
    /// straight from Queued to Completed) but never regress and never leave
    /// a terminal state.
    pub fn is_valid_transition(from: &Self, to: &Self) -> bool {
        !from.is_terminal() && to.rank() > from.rank()
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// The lifecycle record of one in-progress or completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub job_id: String,
    pub target_address: String,
    pub status: ScanStatus,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// -- Lenient read models for the Scan Service list endpoints --
//
// Every field beyond the identifier is optional or defaulted so one
// malformed record never poisons a whole list response.

/// A target as reported by the Scan Service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub last_scan_date: Option<DateTime<Utc>>,
}

/// A scan as reported by the Scan Service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(default)]
    pub scan_id: String,
    #[serde(default)]
    pub target_address: String,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

impl ScanRecord {
    /// Parsed status, `None` when missing or unrecognized.
    pub fn status(&self) -> Option<ScanStatus> {
        self.current_status.as_deref().and_then(ScanStatus::parse)
    }
}

/// A vulnerability as reported by the Scan Service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    #[serde(default)]
    pub vuln_id: String,
    #[serde(default)]
    pub vuln_name: String,
    #[serde(default)]
    pub target_address: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}
