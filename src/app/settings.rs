use std::net::SocketAddr;
use std::time::Duration;

use crate::args::{OutputFormat, RunArgs, ServeArgs, parsers::parse_listen_addr};
use crate::config::{ConfigFile, TestConfigRequest};
use crate::control::DEFAULT_LISTEN;
use crate::error::ValidationError;

const DEFAULT_REPORT_INTERVAL_SECS: u64 = 1;

/// `run` options after merging the command line over the config file.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) request: TestConfigRequest,
    pub(crate) report_interval: Duration,
    pub(crate) output_format: OutputFormat,
    pub(crate) container_host: Option<String>,
}

impl RunSettings {
    pub(crate) fn resolve(args: &RunArgs, file: Option<ConfigFile>) -> Self {
        let mut request = args.test.to_request();
        let mut report_interval = args.report_interval;
        let mut container_host = args.container_host.clone();
        if let Some(file) = file {
            request.merge_missing(file.test);
            report_interval = report_interval.or(file.report_interval);
            container_host = container_host.or(file.container_host);
        }
        let report_secs = report_interval
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS);
        Self {
            request,
            report_interval: Duration::from_secs(report_secs),
            output_format: args.output_format,
            container_host,
        }
    }
}

/// `serve` options after merging the command line over the config file.
#[derive(Debug, Clone)]
pub(crate) struct ServeSettings {
    pub(crate) listen: SocketAddr,
    pub(crate) auth_token: Option<String>,
    pub(crate) container_host: Option<String>,
}

impl ServeSettings {
    pub(crate) fn resolve(
        args: &ServeArgs,
        file: Option<ConfigFile>,
    ) -> Result<Self, ValidationError> {
        let mut listen = args.listen.clone();
        let mut auth_token = args.auth_token.clone();
        let mut container_host = args.container_host.clone();
        if let Some(file) = file {
            listen = listen.or(file.listen);
            auth_token = auth_token.or(file.auth_token);
            container_host = container_host.or(file.container_host);
        }
        let listen = parse_listen_addr(listen.as_deref().unwrap_or(DEFAULT_LISTEN))?;
        Ok(Self {
            listen,
            auth_token: auth_token.filter(|token| !token.is_empty()),
            container_host,
        })
    }
}
