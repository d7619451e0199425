use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_RPS: u64 = 10;
pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECTIONS: usize = 10;
pub const DEFAULT_METHOD: &str = "GET";

/// Test parameters as supplied by a caller.
///
/// Every field is optional; absent or non-positive numbers fall back to the
/// defaults when the request is normalized into a [`TestConfig`].
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TestConfigRequest {
    #[serde(alias = "target_url", alias = "url")]
    pub target_url: Option<String>,
    pub rps: Option<i64>,
    pub duration: Option<i64>,
    pub method: Option<String>,
    pub timeout: Option<i64>,
    #[serde(alias = "concurrency")]
    pub connections: Option<i64>,
    pub headers: Option<BTreeMap<String, String>>,
    pub body: Option<String>,
}

impl TestConfigRequest {
    /// Fills every unset field from `fallback`, keeping values already present.
    pub fn merge_missing(&mut self, fallback: Self) {
        let Self {
            target_url,
            rps,
            duration,
            method,
            timeout,
            connections,
            headers,
            body,
        } = fallback;
        self.target_url = self.target_url.take().or(target_url);
        self.rps = self.rps.or(rps);
        self.duration = self.duration.or(duration);
        self.method = self.method.take().or(method);
        self.timeout = self.timeout.or(timeout);
        self.connections = self.connections.or(connections);
        self.headers = self.headers.take().or(headers);
        self.body = self.body.take().or(body);
    }
}

/// Normalized, immutable parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub target_url: Url,
    pub method: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    /// Always >= 1.
    pub rps: u64,
    pub duration: Duration,
    pub timeout: Duration,
    /// Always >= 1.
    pub connections: usize,
}

/// Contents of a `traffic-gen.toml` / `traffic-gen.json` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub test: TestConfigRequest,
    pub listen: Option<String>,
    #[serde(alias = "containerHost")]
    pub container_host: Option<String>,
    #[serde(alias = "authToken")]
    pub auth_token: Option<String>,
    #[serde(alias = "reportInterval")]
    pub report_interval: Option<u64>,
}
