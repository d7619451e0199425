use std::time::Duration;

use url::Url;

use crate::error::ValidationError;

use super::types::{
    DEFAULT_CONNECTIONS, DEFAULT_DURATION_SECS, DEFAULT_METHOD, DEFAULT_RPS, DEFAULT_TIMEOUT_SECS,
    TestConfig, TestConfigRequest,
};

const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

impl TestConfigRequest {
    /// Validates the request and applies defaults to absent or non-positive
    /// values.
    ///
    /// # Errors
    ///
    /// Returns an error when the target URL is missing, cannot be parsed, or
    /// does not use http/https.
    pub fn normalize(self) -> Result<TestConfig, ValidationError> {
        let raw_url = self
            .target_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingTargetUrl)?;
        let target_url = parse_target_url(raw_url)?;

        let method = self
            .method
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(|| DEFAULT_METHOD.to_owned(), str::to_ascii_uppercase);

        Ok(TestConfig {
            target_url,
            method,
            body: self.body.unwrap_or_default(),
            headers: self.headers.unwrap_or_default(),
            rps: positive_or(self.rps, DEFAULT_RPS),
            duration: Duration::from_secs(positive_or(self.duration, DEFAULT_DURATION_SECS)),
            timeout: Duration::from_secs(positive_or(self.timeout, DEFAULT_TIMEOUT_SECS)),
            connections: usize::try_from(positive_or(
                self.connections,
                u64::try_from(DEFAULT_CONNECTIONS).unwrap_or(u64::MAX),
            ))
            .unwrap_or(usize::MAX),
        })
    }
}

fn positive_or(value: Option<i64>, default: u64) -> u64 {
    value
        .and_then(|value| u64::try_from(value).ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_target_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|err| ValidationError::InvalidTargetUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme {
            url: raw.to_owned(),
            scheme: other.to_owned(),
        }),
    }
}

/// Points loopback targets at `container_host` so a generator running inside
/// a container can reach services published on its host.
///
/// Returns `true` when the URL was changed.
pub fn rewrite_for_container(url: &mut Url, container_host: &str) -> bool {
    let is_loopback = url
        .host_str()
        .is_some_and(|host| LOOPBACK_HOSTS.contains(&host));
    if !is_loopback {
        return false;
    }
    url.set_host(Some(container_host)).is_ok()
}
