use std::time::Duration;

use reqwest::{Client, redirect};
use tracing::error;

use crate::error::HttpError;

pub const DEFAULT_USER_AGENT: &str = concat!("traffic-gen/", env!("CARGO_PKG_VERSION"));

const REDIRECT_LIMIT: usize = 10;

/// Builds the client shared by every request of a run. `timeout` bounds each
/// request from connect through the end of the response body.
///
/// # Errors
///
/// Returns an error when the TLS backend or client cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<Client, HttpError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .redirect(redirect::Policy::limited(REDIRECT_LIMIT))
        .build()
        .map_err(|err| {
            error!("Failed to build HTTP client: {}", err);
            HttpError::BuildClientFailed { source: err }
        })
}
