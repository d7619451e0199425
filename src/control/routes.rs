use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TestConfigRequest;
use crate::controller::TestController;
use crate::error::{AppError, ControlError, HttpError};

use super::http::HttpRequest;

pub(super) const HEALTH_PATH: &str = "/health";
pub(super) const START_PATH: &str = "/start-traffic-test";
pub(super) const STOP_PATH: &str = "/stop-traffic-test";
pub(super) const METRICS_PATH: &str = "/traffic-metrics";

/// Response envelope shared by every route.
#[derive(Debug, Serialize)]
pub(super) struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug)]
pub(super) struct Reply {
    pub(super) status: u16,
    pub(super) body: Vec<u8>,
}

impl Reply {
    pub(super) fn ok<T: Serialize>(data: &T) -> Self {
        Self::json(
            200,
            &ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            },
        )
    }

    pub(super) fn error(status: u16, message: &str) -> Self {
        Self::json(
            status,
            &ApiResponse::<()> {
                success: false,
                data: None,
                error: Some(message.to_owned()),
            },
        )
    }

    const fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    fn json<T: Serialize>(status: u16, response: &ApiResponse<T>) -> Self {
        match serde_json::to_vec(response) {
            Ok(body) => Self { status, body },
            Err(err) => {
                let err = HttpError::Serialize {
                    context: "control response",
                    source: err,
                };
                warn!("{}", err);
                Self {
                    status: 500,
                    body: br#"{"success":false,"error":"Failed to serialize response"}"#.to_vec(),
                }
            }
        }
    }
}

/// Maps one parsed request onto the controller.
pub(super) async fn route(
    request: &HttpRequest,
    controller: &TestController,
    auth_token: Option<&str>,
) -> Reply {
    let method = request.method.as_str();
    let path = request.route_path();
    debug!("Control request {} {}", method, path);

    if method == "OPTIONS" {
        return Reply::empty(204);
    }
    if path != HEALTH_PATH && !is_authorized(request, auth_token) {
        return Reply::error(401, "Unauthorized");
    }

    match (method, path) {
        ("GET", HEALTH_PATH) => Reply::ok(&"ok"),
        ("POST", START_PATH) => start_test(request, controller).await,
        ("POST", STOP_PATH) => match controller.stop().await {
            Ok(()) => Reply::ok(&"Traffic test stopped successfully"),
            Err(err) => Reply::error(400, &err.to_string()),
        },
        ("GET", METRICS_PATH) => match controller.query_metrics().await {
            Ok(snapshot) => Reply::ok(&snapshot),
            Err(err @ ControlError::NeverStarted) => Reply::error(404, &err.to_string()),
            Err(err @ ControlError::NotRunning) => Reply::error(400, &err.to_string()),
        },
        (_, HEALTH_PATH | START_PATH | STOP_PATH | METRICS_PATH) => {
            Reply::error(405, "Method not allowed")
        }
        _ => Reply::error(404, "Not found"),
    }
}

async fn start_test(request: &HttpRequest, controller: &TestController) -> Reply {
    if !request.has_json_body() {
        return Reply::error(415, "Expected an application/json body");
    }
    let config = if request.body.is_empty() {
        TestConfigRequest::default()
    } else {
        match serde_json::from_slice::<TestConfigRequest>(&request.body) {
            Ok(config) => config,
            Err(err) => {
                debug!("Invalid start payload: {}", err);
                return Reply::error(400, "Invalid JSON payload");
            }
        }
    };

    match controller.start(config).await {
        Ok(_) => Reply::ok(&"Traffic test started successfully"),
        Err(AppError::Validation(err)) => Reply::error(400, &err.to_string()),
        Err(err) => {
            warn!("Failed to start traffic test: {}", err);
            Reply::error(500, &err.to_string())
        }
    }
}

fn is_authorized(request: &HttpRequest, auth_token: Option<&str>) -> bool {
    let Some(token) = auth_token else {
        return true;
    };
    let expected = format!("Bearer {}", token);
    request
        .headers
        .get("authorization")
        .is_some_and(|value| value.trim() == expected)
}
