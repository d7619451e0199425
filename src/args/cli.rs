use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};

use crate::config::TestConfigRequest;

use super::parsers::parse_header;
use super::types::OutputFormat;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Controllable HTTP traffic generator - paced requests, bounded concurrency, and live latency/status metrics."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Path to a config file (.toml or .json); defaults to ./traffic-gen.toml or ./traffic-gen.json
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one traffic test in the foreground and print a summary
    Run(RunArgs),
    /// Serve the JSON control plane (start/stop/metrics over HTTP)
    Serve(ServeArgs),
}

/// Test parameters shared by the `run` subcommand and config files.
#[derive(Debug, Args, Clone, Default)]
pub struct TestArgs {
    /// Target URL for the traffic test
    #[arg(long, short, help_heading = "Test Options")]
    pub url: Option<String>,

    /// Requests per second [default: 10]
    #[arg(long, short = 'q', allow_negative_numbers = true, help_heading = "Test Options")]
    pub rps: Option<i64>,

    /// Duration of the test in seconds [default: 60]
    #[arg(long, short = 't', allow_negative_numbers = true, help_heading = "Test Options")]
    pub duration: Option<i64>,

    /// HTTP method [default: GET]
    #[arg(long, short = 'X', help_heading = "Test Options")]
    pub method: Option<String>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long, allow_negative_numbers = true, help_heading = "Test Options")]
    pub timeout: Option<i64>,

    /// Maximum concurrent in-flight requests [default: 10]
    #[arg(long, short = 'c', allow_negative_numbers = true, help_heading = "Test Options")]
    pub connections: Option<i64>,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header, help_heading = "Test Options")]
    pub headers: Vec<(String, String)>,

    /// Request body, sent as-is
    #[arg(long, short, help_heading = "Test Options")]
    pub data: Option<String>,
}

impl TestArgs {
    #[must_use]
    pub fn to_request(&self) -> TestConfigRequest {
        let headers = if self.headers.is_empty() {
            None
        } else {
            Some(self.headers.iter().cloned().collect::<BTreeMap<_, _>>())
        };
        TestConfigRequest {
            target_url: self.url.clone(),
            rps: self.rps,
            duration: self.duration,
            method: self.method.clone(),
            timeout: self.timeout,
            connections: self.connections,
            headers,
            body: self.data.clone(),
        }
    }
}

#[derive(Debug, Args, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub test: TestArgs,

    /// Seconds between progress log lines [default: 1]
    #[arg(long = "report-interval")]
    pub report_interval: Option<u64>,

    /// Format of the final summary
    #[arg(long = "output-format", value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Rewrite localhost/127.0.0.1 targets to this host (e.g. host.docker.internal)
    #[arg(long = "container-host", env = "TRAFFIC_GEN_CONTAINER_HOST")]
    pub container_host: Option<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ServeArgs {
    /// Address for the control plane [default: 127.0.0.1:8080]
    #[arg(long, env = "TRAFFIC_GEN_LISTEN")]
    pub listen: Option<String>,

    /// Require 'Authorization: Bearer <token>' on control routes
    #[arg(long = "auth-token", env = "TRAFFIC_GEN_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Rewrite localhost/127.0.0.1 targets to this host (e.g. host.docker.internal)
    #[arg(long = "container-host", env = "TRAFFIC_GEN_CONTAINER_HOST")]
    pub container_host: Option<String>,
}
