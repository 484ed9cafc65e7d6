//! Thin HTTP client for the accrual calculator.
//!
//! Outcomes are a tagged set callers dispatch on: `Ok` for anything the
//! pipeline can act upon, [`UpstreamError::Throttled`] carrying the
//! retry-after duration, [`UpstreamError::Transient`] for server errors and
//! transport failures. Throttling never leaves the pipeline.

use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::model::OrderStatus;

const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);
/// Used when a 429 carries no parseable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("throttled, retry after {}s", .0.as_secs())]
    Throttled(Duration),
    #[error("transient upstream failure: {0}")]
    Transient(String),
}

/// Lifecycle state as the calculator reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpstreamStatus {
    Registered,
    Processing,
    Processed,
    Invalid,
}

impl UpstreamStatus {
    /// Map onto the stored status. REGISTERED counts as PROCESSING: an order
    /// the upstream knows about is past NEW and must not regress.
    pub fn encode(self) -> OrderStatus {
        match self {
            UpstreamStatus::Registered | UpstreamStatus::Processing => OrderStatus::Processing,
            UpstreamStatus::Processed => OrderStatus::Processed,
            UpstreamStatus::Invalid => OrderStatus::Invalid,
        }
    }
}

/// Decoded body of `GET /api/orders/{number}`.
#[derive(Debug, Deserialize)]
pub struct StatusReport {
    pub status: UpstreamStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub accrual: Option<Decimal>,
}

pub struct AccrualClient {
    http: reqwest::Client,
    base: String,
}

impl AccrualClient {
    pub fn new(address: &str) -> Result<Self, reqwest::Error> {
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}")
        };
        let http = reqwest::Client::builder()
            .timeout(TRANSPORT_TIMEOUT)
            .build()?;
        Ok(Self { http, base })
    }

    /// Submit an order for accrual calculation.
    ///
    /// Any non-throttled, non-5xx response counts as accepted; the polling
    /// path owns the truth from there.
    pub async fn post_order(&self, number: i64) -> Result<(), UpstreamError> {
        let body = serde_json::json!({
            "order": number.to_string(),
            "goods": [{ "description": "LG product", "price": 50000.0 }],
        });

        let response = self
            .http
            .post(format!("{}/api/orders", self.base))
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::Throttled(retry_after(&response))),
            status if status.is_server_error() => {
                Err(UpstreamError::Transient(format!("status {status}")))
            }
            _ => Ok(()),
        }
    }

    /// Poll the calculator for an order's current state.
    pub async fn order_status(&self, number: i64) -> Result<StatusReport, UpstreamError> {
        let response = self
            .http
            .get(format!("{}/api/orders/{number}", self.base))
            .send()
            .await
            .map_err(|e| UpstreamError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::Throttled(retry_after(&response))),
            status if status.is_success() => response
                .json::<StatusReport>()
                .await
                .map_err(|e| UpstreamError::Transient(format!("bad status body: {e}"))),
            status => Err(UpstreamError::Transient(format!("status {status}"))),
        }
    }

    /// Push the reward configuration the calculator scores goods against.
    /// Optional startup step, off by default.
    pub async fn push_reward_config(&self) -> Result<(), UpstreamError> {
        let body = serde_json::json!({ "match": "LG", "reward": 7, "reward_type": "%" });

        let response = self
            .http
            .post(format!("{}/api/goods", self.base))
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UpstreamError::Transient(format!(
                "reward setup rejected: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn retry_after(response: &reqwest::Response) -> Duration {
    parse_retry_after(
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
    )
}

fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after(Some("2")), Duration::from_secs(2));
        assert_eq!(parse_retry_after(Some(" 30 ")), Duration::from_secs(30));
        assert_eq!(parse_retry_after(Some("soon")), DEFAULT_RETRY_AFTER);
        assert_eq!(parse_retry_after(None), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn upstream_status_encoding() {
        assert_eq!(UpstreamStatus::Registered.encode(), OrderStatus::Processing);
        assert_eq!(UpstreamStatus::Processing.encode(), OrderStatus::Processing);
        assert_eq!(UpstreamStatus::Processed.encode(), OrderStatus::Processed);
        assert_eq!(UpstreamStatus::Invalid.encode(), OrderStatus::Invalid);
    }

    #[test]
    fn status_report_decoding() {
        let report: StatusReport =
            serde_json::from_str(r#"{"status":"PROCESSED","accrual":500}"#).unwrap();
        assert_eq!(report.status, UpstreamStatus::Processed);
        assert_eq!(report.accrual, Some(Decimal::from(500)));

        let report: StatusReport = serde_json::from_str(r#"{"status":"REGISTERED"}"#).unwrap();
        assert_eq!(report.status, UpstreamStatus::Registered);
        assert_eq!(report.accrual, None);
    }
}
