use std::net::SocketAddr;

use crate::error::ValidationError;

pub(crate) fn parse_header(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        Some(_) | None => Err(ValidationError::InvalidHeaderFormat {
            value: s.to_owned(),
        }),
    }
}

pub(crate) fn parse_listen_addr(s: &str) -> Result<SocketAddr, ValidationError> {
    s.trim()
        .parse::<SocketAddr>()
        .map_err(|err| ValidationError::InvalidListenAddr {
            value: s.to_owned(),
            source: err,
        })
}
