use tracing::info;

use crate::metrics::MetricsSnapshot;

pub(super) fn log_progress(snapshot: &MetricsSnapshot) {
    info!(
        "{} elapsed | {} requests ({} ok, {} failed) | {:.1} rps | avg {:.1}ms | in-flight {} | dropped ticks {}",
        snapshot.elapsed_time,
        snapshot.total_requests,
        snapshot.success_requests,
        snapshot.failed_requests,
        snapshot.rps,
        snapshot.avg_response_time,
        snapshot.in_flight,
        snapshot.dropped_ticks
    );
}
