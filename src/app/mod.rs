//! Foreground `run` and `serve` modes.
mod progress;
mod runner;
mod server;
mod settings;
mod signals;
mod summary;


pub(crate) use runner::run_local;
pub(crate) use server::run_server;
pub(crate) use settings::{RunSettings, ServeSettings};
