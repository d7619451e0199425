use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{LatencyHistogram, MetricsSnapshot, RequestOutcome};

/// Mutable state of a single run. Only touched through [`MetricsAggregator`].
#[derive(Debug)]
pub(super) struct RunState {
    pub(super) running: bool,
    pub(super) stopped_after: Option<Duration>,
    pub(super) latencies: Vec<Duration>,
    pub(super) status_codes: BTreeMap<String, u64>,
    pub(super) errors: Vec<String>,
}

impl RunState {
    pub(super) const fn new() -> Self {
        Self {
            running: true,
            stopped_after: None,
            latencies: Vec::new(),
            status_codes: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub(super) fn apply(&mut self, outcome: RequestOutcome) {
        let RequestOutcome {
            latency,
            status,
            error,
        } = outcome;
        self.latencies.push(latency);
        if let Some(status) = status {
            let count = self.status_codes.entry(status.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        }
        if let Some(error) = error {
            self.errors.push(error);
        }
    }
}

/// Accumulates request outcomes for one run.
///
/// Every write takes the lock exclusively; snapshots share it, so a snapshot
/// never observes half of an outcome.
#[derive(Debug)]
pub struct MetricsAggregator {
    started_at: Instant,
    started_wall: DateTime<Utc>,
    state: RwLock<RunState>,
    ticks: AtomicU64,
    dropped_ticks: AtomicU64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    /// Starts the run clock; the new run is marked running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            started_wall: Utc::now(),
            state: RwLock::new(RunState::new()),
            ticks: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
        }
    }

    pub async fn record_outcome(&self, outcome: RequestOutcome) {
        let mut state = self.state.write().await;
        state.apply(outcome);
    }

    /// Marks the run finished and freezes its elapsed time. Later calls keep
    /// the first stop time.
    pub async fn mark_stopped(&self) {
        let mut state = self.state.write().await;
        state.running = false;
        if state.stopped_after.is_none() {
            state.stopped_after = Some(self.started_at.elapsed());
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    pub fn record_tick(&self, dispatched: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if !dispatched {
            self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read().await;
        let elapsed = state
            .stopped_after
            .unwrap_or_else(|| self.started_at.elapsed());
        let mut snapshot = derive_snapshot(&state, elapsed);
        drop(state);

        snapshot.start_time = self
            .started_wall
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        snapshot.ticks = self.ticks();
        snapshot.dropped_ticks = self.dropped_ticks();
        snapshot
    }
}

pub(super) fn derive_snapshot(state: &RunState, elapsed: Duration) -> MetricsSnapshot {
    let total = u64::try_from(state.latencies.len()).unwrap_or(u64::MAX);
    let failed = u64::try_from(state.errors.len()).unwrap_or(u64::MAX);
    let success = total.saturating_sub(failed);

    let mut sum = Duration::ZERO;
    let mut min: Option<Duration> = None;
    let mut max: Option<Duration> = None;
    for latency in &state.latencies {
        sum = sum.saturating_add(*latency);
        min = Some(min.map_or(*latency, |current| current.min(*latency)));
        max = Some(max.map_or(*latency, |current| current.max(*latency)));
    }

    let percentiles = match LatencyHistogram::from_latencies(&state.latencies) {
        Ok(histogram) => histogram.percentiles(),
        Err(err) => {
            tracing::warn!("Failed to build latency histogram: {}", err);
            None
        }
    };

    let (avg_response_time, success_rate, error_rate, rps) = if total == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (
            average_millis(sum, total),
            percent(success, total),
            percent(failed, total),
            per_second(total, elapsed),
        )
    };

    MetricsSnapshot {
        start_time: String::new(),
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        elapsed_time: format!("{:.3}s", elapsed.as_secs_f64()),
        total_requests: total,
        success_requests: success,
        failed_requests: failed,
        avg_response_time,
        min_response_time: min.map(millis),
        max_response_time: max.map(millis),
        p50_response_time: percentiles.map(|(p50, _, _)| millis(p50)),
        p90_response_time: percentiles.map(|(_, p90, _)| millis(p90)),
        p99_response_time: percentiles.map(|(_, _, p99)| millis(p99)),
        success_rate,
        error_rate,
        rps,
        status_codes: state.status_codes.clone(),
        errors: state.errors.clone(),
        is_running: state.running,
        in_flight: 0,
        ticks: 0,
        dropped_ticks: 0,
    }
}

const fn count_f64(value: u64) -> f64 {
    value as f64
}

#[expect(
    clippy::float_arithmetic,
    reason = "Snapshot latencies are reported as fractional milliseconds."
)]
fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[expect(
    clippy::float_arithmetic,
    reason = "Average latency is fractional."
)]
fn average_millis(sum: Duration, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    millis(sum) / count_f64(count)
}

#[expect(
    clippy::float_arithmetic,
    reason = "Rates are reported as fractional percentages."
)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    count_f64(part) / count_f64(whole) * 100.0
}

#[expect(
    clippy::float_arithmetic,
    reason = "Observed throughput is fractional."
)]
fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    count_f64(count) / secs
}
