//! Request execution, pacing and admission control.
mod client;
mod executor;
mod limiter;
mod rate;

#[cfg(test)]
mod tests;

pub use client::{DEFAULT_USER_AGENT, build_client};
pub use executor::RequestExecutor;
pub use limiter::{ConcurrencyLimiter, Slot};
pub use rate::{RateScheduler, SchedulerExit, SchedulerReport, tick_interval};
