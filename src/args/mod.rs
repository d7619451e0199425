//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::{Cli, Command, RunArgs, ServeArgs, TestArgs};
pub use types::OutputFormat;
