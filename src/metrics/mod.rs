//! Outcome aggregation and derived run statistics.
mod aggregator;
mod histogram;
mod types;


pub use aggregator::MetricsAggregator;
pub use histogram::LatencyHistogram;
pub use types::{MetricsSnapshot, RequestOutcome};
