use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, sleep};

use crate::config::TestConfig;
use crate::shutdown::ShutdownReceiver;

const MILLIS_PER_SECOND: u64 = 1000;

/// Spacing between dispatch ticks for a requests-per-second target.
///
/// Uses whole milliseconds, so rates that do not divide 1000 evenly run
/// slightly fast; rates above 1000/s are capped at one tick per millisecond.
#[must_use]
pub fn tick_interval(rps: u64) -> Duration {
    let millis = MILLIS_PER_SECOND
        .checked_div(rps)
        .unwrap_or(MILLIS_PER_SECOND)
        .max(1);
    Duration::from_millis(millis)
}

/// Why a scheduling loop ended. Both exits are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    Stopped,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub exit: SchedulerExit,
    pub ticks: u64,
    pub dispatched: u64,
    pub dropped: u64,
}

/// Single timer driving dispatch for one run.
#[derive(Debug, Clone, Copy)]
pub struct RateScheduler {
    interval: Duration,
    duration: Duration,
}

impl RateScheduler {
    #[must_use]
    pub fn new(rps: u64, duration: Duration) -> Self {
        Self {
            interval: tick_interval(rps),
            duration,
        }
    }

    #[must_use]
    pub fn for_config(config: &TestConfig) -> Self {
        Self::new(config.rps, config.duration)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Calls `on_tick` once per interval until `stop_rx` fires or the
    /// duration elapses, whichever comes first.
    ///
    /// `on_tick` must not block; it returns whether the tick dispatched a
    /// request or was dropped. Ticks missed while the runtime was busy are
    /// skipped rather than replayed.
    pub async fn run<F>(self, stop_rx: &mut ShutdownReceiver, mut on_tick: F) -> SchedulerReport
    where
        F: FnMut() -> bool,
    {
        // `sleep` saturates to a far-future deadline for huge durations.
        let deadline = sleep(self.duration);
        tokio::pin!(deadline);
        let mut ticker = match Instant::now().checked_add(self.interval) {
            Some(first_tick) => interval_at(first_tick, self.interval),
            None => interval(self.interval),
        };
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut report = SchedulerReport {
            exit: SchedulerExit::Expired,
            ticks: 0,
            dispatched: 0,
            dropped: 0,
        };

        report.exit = loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => break SchedulerExit::Stopped,
                () = &mut deadline => break SchedulerExit::Expired,
                _ = ticker.tick() => {
                    report.ticks = report.ticks.saturating_add(1);
                    if on_tick() {
                        report.dispatched = report.dispatched.saturating_add(1);
                    } else {
                        report.dropped = report.dropped.saturating_add(1);
                    }
                }
            }
        };

        report
    }
}
