//! Controllable HTTP traffic generator.
//!
//! A [`controller::TestController`] drives one run at a time: requests are
//! paced by a fixed-interval scheduler, bounded by a concurrency limit, and
//! folded into a [`metrics::MetricsAggregator`] that can be snapshotted while
//! the run is live. The `traffic-gen` binary exposes this as a foreground
//! `run` command and as a small JSON control plane (`serve`).
pub mod args;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod shutdown;

mod app;
mod entry;

pub use entry::run;
