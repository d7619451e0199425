use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::controller::TestController;
use crate::error::AppResult;
use crate::metrics::MetricsSnapshot;

use super::progress::log_progress;
use super::settings::RunSettings;
use super::signals::termination;
use super::summary::print_summary;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Runs one test until it expires or the process is asked to terminate, then
/// prints its summary.
pub(crate) async fn run_local(settings: RunSettings) -> AppResult<MetricsSnapshot> {
    let controller = TestController::new().with_container_host(settings.container_host);
    let config = controller
        .start(settings.request)
        .await
        .inspect_err(|err| error!("{}", err))?;

    let interrupted = termination();
    tokio::pin!(interrupted);

    let first_report = tokio::time::Instant::now()
        .checked_add(settings.report_interval)
        .unwrap_or_else(tokio::time::Instant::now);
    let mut report_tick = interval_at(first_report, settings.report_interval);
    report_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = controller.wait_idle() => break,
            () = &mut interrupted => {
                info!("Stopping traffic test early");
                if let Err(err) = controller.stop().await {
                    debug!("{}", err);
                }
                break;
            }
            _ = report_tick.tick() => {
                match controller.query_metrics().await {
                    Ok(snapshot) => log_progress(&snapshot),
                    Err(err) => warn!("Failed to read progress: {}", err),
                }
            }
        }
    }

    wait_for_drain(&controller, config.timeout).await;

    let snapshot = controller.query_metrics().await?;
    print_summary(&snapshot, Some(&*config), settings.output_format)?;
    Ok(snapshot)
}

/// Gives requests still in flight up to one request timeout to land so the
/// summary counts them.
async fn wait_for_drain(controller: &TestController, limit: Duration) {
    let drained = tokio::time::timeout(limit, async {
        while in_flight(controller).await > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!("{} requests still in flight at exit", in_flight(controller).await);
    }
}

async fn in_flight(controller: &TestController) -> usize {
    controller
        .query_metrics()
        .await
        .map_or(0, |snapshot| snapshot.in_flight)
}
