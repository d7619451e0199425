//! Lifecycle of traffic runs: start, stop and metric queries.
mod run;


use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::config::{TestConfig, TestConfigRequest, rewrite_for_container};
use crate::error::{AppError, AppResult, ControlError};
use crate::http::build_client;
use crate::metrics::MetricsSnapshot;

use run::ActiveRun;

/// Externally visible state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Stopping,
}

impl RunPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Stopping => "stopping",
        }
    }
}

/// Owns at most one live run and the metrics of the most recent one.
///
/// Controllers are independent of each other; nothing here is global.
#[derive(Debug)]
pub struct TestController {
    active: Mutex<Option<ActiveRun>>,
    phase_tx: Arc<watch::Sender<RunPhase>>,
    container_host: Option<String>,
}

impl Default for TestController {
    fn default() -> Self {
        Self::new()
    }
}

impl TestController {
    #[must_use]
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(RunPhase::Idle);
        Self {
            active: Mutex::new(None),
            phase_tx: Arc::new(phase_tx),
            container_host: None,
        }
    }

    /// Rewrites loopback targets to `host` before each run starts.
    #[must_use]
    pub fn with_container_host(mut self, host: Option<String>) -> Self {
        self.container_host = host.filter(|value| !value.trim().is_empty());
        self
    }

    /// Validates `request` and starts a new run, stopping any run still in
    /// progress first. An invalid request leaves the current run untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or malformed target URL, or
    /// an HTTP error when the client cannot be built.
    pub async fn start(&self, request: TestConfigRequest) -> AppResult<Arc<TestConfig>> {
        let mut config = request.normalize().map_err(|err| {
            warn!("Rejected traffic test configuration: {}", err);
            AppError::validation(err)
        })?;

        if let Some(host) = self.container_host.as_deref() {
            let original = config.target_url.to_string();
            if rewrite_for_container(&mut config.target_url, host) {
                info!(
                    "Transformed URL for container access: {} -> {}",
                    original, config.target_url
                );
            }
        }

        let client = build_client(config.timeout).map_err(AppError::http)?;
        let config = Arc::new(config);

        let mut active = self.active.lock().await;
        if let Some(previous) = active.as_mut()
            && previous.halt(&self.phase_tx).await
        {
            info!("Stopped previous traffic test before starting a new one");
        }
        *active = Some(ActiveRun::launch(
            Arc::clone(&config),
            client,
            Arc::clone(&self.phase_tx),
        ));

        Ok(config)
    }

    /// Halts the running test. Requests already in flight finish on their own
    /// and are still counted.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotRunning`] when no run is in progress.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let mut active = self.active.lock().await;
        let run = active.as_mut().ok_or(ControlError::NotRunning)?;
        if run.halt(&self.phase_tx).await {
            Ok(())
        } else {
            Err(ControlError::NotRunning)
        }
    }

    /// Statistics of the current or most recent run.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NeverStarted`] before the first run.
    pub async fn query_metrics(&self) -> Result<MetricsSnapshot, ControlError> {
        let active = self.active.lock().await;
        let run = active.as_ref().ok_or(ControlError::NeverStarted)?;
        let metrics = Arc::clone(&run.metrics);
        let limiter = run.limiter.clone();
        drop(active);

        let mut snapshot = metrics.snapshot().await;
        snapshot.in_flight = limiter.in_flight();
        Ok(snapshot)
    }

    /// Configuration of the current or most recent run.
    pub async fn current_config(&self) -> Option<Arc<TestConfig>> {
        let active = self.active.lock().await;
        active.as_ref().map(|run| Arc::clone(&run.config))
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.phase_tx.borrow()
    }

    /// Resolves once no run is active.
    pub async fn wait_idle(&self) {
        let mut phase_rx = self.phase_tx.subscribe();
        // The sender lives as long as the controller, so this cannot fail.
        drop(phase_rx.wait_for(|phase| *phase == RunPhase::Idle).await);
    }
}
