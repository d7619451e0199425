use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TestConfig;
use crate::http::{
    ConcurrencyLimiter, RateScheduler, RequestExecutor, SchedulerExit, SchedulerReport,
};
use crate::metrics::MetricsAggregator;
use crate::shutdown::{ShutdownSender, shutdown_channel};

use super::RunPhase;

#[derive(Debug)]
pub(super) struct ActiveRun {
    pub(super) config: Arc<TestConfig>,
    pub(super) metrics: Arc<MetricsAggregator>,
    pub(super) limiter: ConcurrencyLimiter,
    stop_tx: ShutdownSender,
    scheduler: Option<JoinHandle<SchedulerReport>>,
}

impl ActiveRun {
    pub(super) fn launch(
        config: Arc<TestConfig>,
        client: Client,
        phase_tx: Arc<watch::Sender<RunPhase>>,
    ) -> Self {
        let metrics = Arc::new(MetricsAggregator::new());
        let limiter = ConcurrencyLimiter::new(config.connections);
        let executor = RequestExecutor::new(client, &config);
        let scheduler = RateScheduler::for_config(&config);
        let (stop_tx, mut stop_rx) = shutdown_channel();

        info!(
            "Starting traffic test: {} {} at {} rps for {}s (interval {}ms, {} connections, timeout {}s)",
            config.method,
            config.target_url,
            config.rps,
            config.duration.as_secs(),
            scheduler.interval().as_millis(),
            config.connections,
            config.timeout.as_secs()
        );
        phase_tx.send_replace(RunPhase::Running);

        let task = {
            let metrics = Arc::clone(&metrics);
            let limiter = limiter.clone();
            let duration_secs = config.duration.as_secs();
            tokio::spawn(async move {
                let report = scheduler
                    .run(&mut stop_rx, || {
                        let Some(slot) = limiter.try_acquire() else {
                            metrics.record_tick(false);
                            return false;
                        };
                        metrics.record_tick(true);
                        tokio::spawn(executor.clone().run(slot, Arc::clone(&metrics)));
                        true
                    })
                    .await;
                metrics.mark_stopped().await;

                match report.exit {
                    SchedulerExit::Stopped => info!("Traffic test stopped by user"),
                    SchedulerExit::Expired => {
                        info!("Traffic test completed after {} seconds", duration_secs);
                    }
                }
                debug!(
                    "Scheduler finished: {} ticks, {} dispatched, {} dropped",
                    report.ticks, report.dispatched, report.dropped
                );

                phase_tx.send_if_modified(|phase| {
                    if *phase == RunPhase::Running {
                        *phase = RunPhase::Idle;
                        true
                    } else {
                        false
                    }
                });
                report
            })
        };

        Self {
            config,
            metrics,
            limiter,
            stop_tx,
            scheduler: Some(task),
        }
    }

    /// Stops the scheduler and waits for it to exit. Returns `false` when the
    /// run had already ended.
    pub(super) async fn halt(&mut self, phase_tx: &watch::Sender<RunPhase>) -> bool {
        if !self.metrics.is_running().await {
            self.join_scheduler().await;
            return false;
        }

        phase_tx.send_replace(RunPhase::Stopping);
        if self.stop_tx.send(()).is_err() {
            debug!("Scheduler exited before the stop signal");
        }
        self.metrics.mark_stopped().await;
        self.join_scheduler().await;
        phase_tx.send_replace(RunPhase::Idle);
        true
    }

    async fn join_scheduler(&mut self) {
        let Some(handle) = self.scheduler.take() else {
            return;
        };
        match handle.await {
            Ok(report) => debug!("Joined scheduler after {} ticks", report.ticks),
            Err(err) => warn!("Scheduler task failed: {}", err),
        }
    }
}
