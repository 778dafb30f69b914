//! HTTP implementation of the Scan Gateway against the scanner's REST API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ScannerConfig;
use crate::errors::GatewayError;
use crate::models::scan::{ScanJob, ScanRecord, ScanStatus, TargetRecord, VulnerabilityRecord};

use super::ScanGateway;

const API_KEY_HEADER: &str = "X-Auth";

/// Scan Service client over its REST API.
#[derive(Debug, Clone)]
pub struct HttpScanGateway {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct CreateTargetResponse {
    target_id: String,
}

#[derive(Debug, Deserialize)]
struct StartScanResponse {
    scan_id: String,
}

#[derive(Debug, Deserialize)]
struct ScanDetailResponse {
    #[serde(default)]
    scan_id: String,
    #[serde(default)]
    target_address: String,
    current_status: Option<String>,
    #[serde(default)]
    progress: Option<u8>,
    #[serde(default)]
    start_date: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    end_date: Option<chrono::DateTime<Utc>>,
}

impl HttpScanGateway {
    /// Build a client with the API key header and per-request timeout from
    /// the scanner configuration.
    pub fn new(config: &ScannerConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&config.api_key)
                .map_err(|e| GatewayError::Validation(format!("invalid API key: {e}")))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_request_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout_secs)
        } else if err.is_connect() {
            GatewayError::Unreachable(err.to_string())
        } else if err.is_decode() {
            GatewayError::Parse(err.to_string())
        } else {
            GatewayError::Transient(err.to_string())
        }
    }

    /// Map a non-success HTTP status into the error taxonomy: 4xx are
    /// validation failures (never retried), everything else is transient.
    async fn error_for_status(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        if status.is_client_error() {
            GatewayError::Validation(detail)
        } else {
            GatewayError::Transient(detail)
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Pull the named list out of a response body. A body that is not an
    /// object (or lacks the key) yields `Null`, which collects to an empty
    /// list; indexing would panic on a non-object body.
    fn take_list(mut value: Value, key: &str) -> Value {
        value
            .get_mut(key)
            .map(Value::take)
            .unwrap_or(Value::Null)
    }

    /// Deserialize the elements of a list response one by one, skipping
    /// malformed records instead of failing the whole list.
    fn collect_records<T: serde::de::DeserializeOwned>(list: Value, kind: &str) -> Vec<T> {
        let Value::Array(items) = list else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(kind, error = %e, "Skipping malformed gateway record");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ScanGateway for HttpScanGateway {
    async fn create_target(
        &self,
        address: &str,
        description: &str,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "address": address,
            "description": description,
        });
        let created: CreateTargetResponse = self.post_json("/targets", &body).await?;
        Ok(created.target_id)
    }

    async fn start_scan(
        &self,
        target_id: &str,
        profile_id: &str,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "target_id": target_id,
            "profile_id": profile_id,
            "schedule": { "disable": false },
        });
        let started: StartScanResponse = self.post_json("/scans", &body).await?;
        Ok(started.scan_id)
    }

    async fn scan_status(&self, job_id: &str) -> Result<ScanJob, GatewayError> {
        let value = self.get_json(&format!("/scans/{job_id}")).await?;
        let detail: ScanDetailResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let raw_status = detail
            .current_status
            .ok_or_else(|| GatewayError::Parse("scan status missing".to_string()))?;
        let status = ScanStatus::parse(&raw_status)
            .ok_or_else(|| GatewayError::Parse(format!("unknown scan status: {raw_status}")))?;

        Ok(ScanJob {
            job_id: detail.scan_id,
            target_address: detail.target_address,
            status,
            progress_percent: detail.progress.unwrap_or(0).min(100),
            started_at: detail.start_date.unwrap_or_else(Utc::now),
            finished_at: detail.end_date,
        })
    }

    async fn list_targets(&self) -> Result<Vec<TargetRecord>, GatewayError> {
        let value = self.get_json("/targets").await?;
        Ok(Self::collect_records(
            Self::take_list(value, "targets"),
            "target",
        ))
    }

    async fn list_scans(&self) -> Result<Vec<ScanRecord>, GatewayError> {
        let value = self.get_json("/scans").await?;
        Ok(Self::collect_records(Self::take_list(value, "scans"), "scan"))
    }

    async fn list_vulnerabilities(&self) -> Result<Vec<VulnerabilityRecord>, GatewayError> {
        let value = self.get_json("/vulnerabilities").await?;
        Ok(Self::collect_records(
            Self::take_list(value, "vulnerabilities"),
            "vulnerability",
        ))
    }

    async fn test_credentials(&self, url: &str, key: &str) -> Result<bool, GatewayError> {
        let value = HeaderValue::from_str(key)
            .map_err(|e| GatewayError::Validation(format!("invalid API key: {e}")))?;
        let response = self
            .client
            .get(format!("{}/me", url.trim_end_matches('/')))
            .header(API_KEY_HEADER, value)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            _ => Err(Self::error_for_status(response).await),
        }
    }
}
