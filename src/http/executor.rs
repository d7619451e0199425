use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::{
    Client, Method, Request,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::TestConfig;
use crate::metrics::{MetricsAggregator, RequestOutcome};

use super::limiter::Slot;

#[derive(Debug)]
enum RequestTemplate {
    Ready(RequestParts),
    Invalid(String),
}

#[derive(Debug)]
struct RequestParts {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<String>,
}

impl RequestParts {
    fn build(&self, client: &Client) -> Result<Request, reqwest::Error> {
        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder.build()
    }
}

/// Issues the configured request and reports what happened.
///
/// The request is assembled once per run; a configuration that cannot form
/// a valid request (bad method or header) yields a failed outcome on every
/// dispatch instead of aborting the run.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    template: Arc<RequestTemplate>,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(client: Client, config: &TestConfig) -> Self {
        let template = match request_parts(&client, config) {
            Ok(parts) => RequestTemplate::Ready(parts),
            Err(message) => {
                tracing::warn!("{}", message);
                RequestTemplate::Invalid(message)
            }
        };
        Self {
            client,
            template: Arc::new(template),
        }
    }

    /// Performs one attempt. Never retries.
    pub async fn execute(&self) -> RequestOutcome {
        let start = Instant::now();
        let request = match self.template.as_ref() {
            RequestTemplate::Ready(parts) => match parts.build(&self.client) {
                Ok(request) => request,
                Err(err) => {
                    return RequestOutcome::failure(
                        start.elapsed(),
                        format!("Failed to create request: {}", err),
                    );
                }
            },
            RequestTemplate::Invalid(message) => {
                return RequestOutcome::failure(start.elapsed(), message.clone());
            }
        };

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status().as_u16();
                // Classified by status alone; a broken body only shows in the logs.
                if let Err(err) = drain_response_body(response).await {
                    debug!("Failed to read {} response body: {}", status, err);
                }
                RequestOutcome::response(start.elapsed(), status)
            }
            Err(err) => {
                debug!("Request failed: {}", err);
                RequestOutcome::failure(start.elapsed(), describe_error(&err))
            }
        }
    }

    /// Executes once, records the outcome, then gives the slot back.
    pub async fn run(self, slot: Slot, metrics: Arc<MetricsAggregator>) {
        let outcome = self.execute().await;
        metrics.record_outcome(outcome).await;
        drop(slot);
    }
}

/// Validates method and headers once so a bad configuration is reported a
/// single time instead of per dispatch.
fn request_parts(client: &Client, config: &TestConfig) -> Result<RequestParts, String> {
    let method = Method::from_bytes(config.method.as_bytes()).map_err(|err| {
        format!(
            "Failed to create request: invalid method '{}': {}",
            config.method, err
        )
    })?;

    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            format!("Failed to create request: invalid header name '{}': {}", key, err)
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            format!("Failed to create request: invalid value for header '{}': {}", key, err)
        })?;
        headers.insert(name, value);
    }

    let parts = RequestParts {
        method,
        url: config.target_url.clone(),
        headers,
        body: (!config.body.is_empty()).then(|| config.body.clone()),
    };
    parts
        .build(client)
        .map_err(|err| format!("Failed to create request: {}", err))?;
    Ok(parts)
}

fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {}", err)
    } else if err.is_connect() {
        format!("connection error: {}", err)
    } else {
        format!("request error: {}", err)
    }
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
