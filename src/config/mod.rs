//! Application configuration loaded from environment variables, plus the
//! runtime-tunable Scan Service settings consumed by the orchestrator.

use std::env;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub scanner: ScannerConfig,
}

/// Scan Service settings. Updatable at runtime through the config endpoint;
/// out-of-range values are rejected by validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScannerConfig {
    pub api_url: String,
    pub api_key: String,
    /// Opaque identifier selecting scan depth on the Scan Service side.
    pub scan_profile_id: String,
    #[validate(range(min = 1, max = 10))]
    pub max_concurrent_scans: usize,
    #[validate(range(min = 1, max = 5))]
    pub retry_attempts: u32,
    #[validate(range(min = 10, max = 120))]
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://127.0.0.1:3443/api/v1".to_string(),
            api_key: String::new(),
            scan_profile_id: "11111111-1111-1111-1111-111111111111".to_string(),
            max_concurrent_scans: 3,
            retry_attempts: 3,
            request_timeout_secs: 30,
            poll_interval_secs: 5,
        }
    }
}

impl ScannerConfig {
    /// Concurrency bound forced into the recognized 1–10 range.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_scans.clamp(1, 10)
    }

    /// Retry budget forced into the recognized 1–5 range.
    pub fn retry_budget(&self) -> u32 {
        self.retry_attempts.clamp(1, 5)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = ScannerConfig::default();
        Ok(Self {
            host: env::var("SCANBRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SCANBRIDGE_PORT")
                .unwrap_or_else(|_| "3200".to_string())
                .parse()
                .unwrap_or(3200),
            scanner: ScannerConfig {
                api_url: env::var("SCANNER_API_URL").unwrap_or(defaults.api_url),
                api_key: env::var("SCANNER_API_KEY").unwrap_or_default(),
                scan_profile_id: env::var("SCANNER_PROFILE_ID")
                    .unwrap_or(defaults.scan_profile_id),
                max_concurrent_scans: env::var("SCANNER_MAX_CONCURRENT_SCANS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_concurrent_scans),
                retry_attempts: env::var("SCANNER_RETRY_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.retry_attempts),
                request_timeout_secs: env::var("SCANNER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.request_timeout_secs),
                poll_interval_secs: env::var("SCANNER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.poll_interval_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_scans, 3);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn concurrency_out_of_range_rejected() {
        let config = ScannerConfig {
            max_concurrent_scans: 11,
            ..ScannerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_out_of_range_rejected() {
        let config = ScannerConfig {
            retry_attempts: 0,
            ..ScannerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn limits_are_clamped() {
        let config = ScannerConfig {
            max_concurrent_scans: 50,
            retry_attempts: 0,
            ..ScannerConfig::default()
        };
        assert_eq!(config.concurrency_limit(), 10);
        assert_eq!(config.retry_budget(), 1);
    }
}
