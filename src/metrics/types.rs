use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Result of one dispatched request.
///
/// A response outside 2xx/3xx carries both its status code and an
/// `"HTTP <code>"` error; transport failures carry only the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub latency: Duration,
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Classifies a received response by its status code.
    #[must_use]
    pub fn response(latency: Duration, status: u16) -> Self {
        let error = if is_success_status(status) {
            None
        } else {
            Some(format!("HTTP {}", status))
        };
        Self {
            latency,
            status: Some(status),
            error,
        }
    }

    /// A request that never produced a response.
    #[must_use]
    pub fn failure(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            latency,
            status: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

const fn is_success_status(status: u16) -> bool {
    status >= 200 && status < 400
}

/// Point-in-time statistics of a run. Latencies are in milliseconds.
///
/// Min, max and percentile latencies are `None` until the first request
/// completes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub start_time: String,
    pub elapsed_ms: u64,
    pub elapsed_time: String,
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time: f64,
    pub min_response_time: Option<f64>,
    pub max_response_time: Option<f64>,
    pub p50_response_time: Option<f64>,
    pub p90_response_time: Option<f64>,
    pub p99_response_time: Option<f64>,
    pub success_rate: f64,
    pub error_rate: f64,
    pub rps: f64,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: Vec<String>,
    pub is_running: bool,
    pub in_flight: usize,
    pub ticks: u64,
    pub dropped_ticks: u64,
}

impl MetricsSnapshot {
    #[must_use]
    pub const fn has_samples(&self) -> bool {
        self.total_requests > 0
    }
}
