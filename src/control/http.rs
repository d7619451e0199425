use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::error::HttpError;

use super::routes::Reply;

/// Request line plus headers; anything longer is refused.
const MAX_HEAD_BYTES: u64 = 16 * 1024;
const MAX_BODY_BYTES: usize = 1024 * 1024;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

/// One control request. Header names are lower-cased.
#[derive(Debug)]
pub(super) struct HttpRequest {
    pub(super) method: String,
    pub(super) path: String,
    pub(super) headers: HashMap<String, String>,
    pub(super) body: Vec<u8>,
}

impl HttpRequest {
    /// Request path without its query string.
    pub(super) fn route_path(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Bodies are JSON; a missing `Content-Type` is taken as JSON too.
    pub(super) fn has_json_body(&self) -> bool {
        self.headers
            .get("content-type")
            .is_none_or(|value| value.to_ascii_lowercase().contains("application/json"))
    }
}

/// Why a request could not be framed, with the status to answer it with.
#[derive(Debug)]
pub(super) struct RequestError {
    pub(super) status: u16,
    pub(super) message: String,
}

impl RequestError {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Reads one request, giving up after `limit` so an idle client cannot hold
/// its task open.
pub(super) async fn read_request<S>(
    socket: &mut S,
    limit: Duration,
) -> Result<HttpRequest, RequestError>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(limit, read_framed(socket)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(RequestError::new(408, "Request not received in time")),
    }
}

async fn read_framed<S>(socket: &mut S) -> Result<HttpRequest, RequestError>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(socket);

    let (request_line, headers) = {
        let mut head = (&mut reader).take(MAX_HEAD_BYTES);
        let request_line = next_line(&mut head)
            .await?
            .ok_or_else(|| RequestError::new(400, "Connection closed before a request line"))?;
        let mut headers = HashMap::new();
        loop {
            let line = next_line(&mut head)
                .await?
                .ok_or_else(|| RequestError::new(431, "Request head is truncated or too large"))?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| RequestError::new(400, format!("Header without a colon: '{}'", line)))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
        (request_line, headers)
    };

    let (method, path) = parse_request_line(&request_line)?;
    let body_len = body_length(&headers)?;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await.map_err(|err| {
        RequestError::new(400, format!("Body shorter than its Content-Length: {}", err))
    })?;

    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Next CRLF/LF-terminated line without its terminator. `None` when the
/// stream ends or the head limit cuts the line short.
async fn next_line<R>(reader: &mut R) -> Result<Option<String>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|err| RequestError::new(400, format!("Unreadable request head: {}", err)))?;
    if read == 0 || !line.ends_with('\n') {
        return Ok(None);
    }
    let content_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(content_len);
    Ok(Some(line))
}

fn parse_request_line(line: &str) -> Result<(String, String), RequestError> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None)
            if version.starts_with("HTTP/1.") && path.starts_with('/') =>
        {
            Ok((method.to_ascii_uppercase(), path.to_owned()))
        }
        _ => Err(RequestError::new(
            400,
            format!("Unsupported request line: '{}'", line),
        )),
    }
}

/// Only `Content-Length` framing is accepted; no header means no body.
fn body_length(headers: &HashMap<String, String>) -> Result<usize, RequestError> {
    if headers.contains_key("transfer-encoding") {
        return Err(RequestError::new(
            411,
            "Chunked bodies are not accepted; send Content-Length",
        ));
    }
    let Some(raw) = headers.get("content-length") else {
        return Ok(0);
    };
    let length = raw
        .parse::<usize>()
        .map_err(|err| RequestError::new(400, format!("Invalid Content-Length '{}': {}", raw, err)))?;
    if length > MAX_BODY_BYTES {
        return Err(RequestError::new(
            413,
            format!("Body of {} bytes exceeds the {} byte limit", length, MAX_BODY_BYTES),
        ));
    }
    Ok(length)
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Sends `reply` as a single write; every reply closes the connection.
pub(super) async fn write_reply<S>(socket: &mut S, reply: &Reply) -> Result<(), HttpError>
where
    S: AsyncWrite + Unpin,
{
    let mut lines = vec![format!(
        "HTTP/1.1 {} {}",
        reply.status,
        reason_phrase(reply.status)
    )];
    if !reply.body.is_empty() {
        lines.push("Content-Type: application/json".to_owned());
    }
    lines.push(format!("Content-Length: {}", reply.body.len()));
    lines.extend(
        CORS_HEADERS
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value)),
    );
    lines.push("Connection: close".to_owned());

    let mut message = lines.join("\r\n").into_bytes();
    message.extend_from_slice(b"\r\n\r\n");
    message.extend_from_slice(&reply.body);

    socket
        .write_all(&message)
        .await
        .map_err(|err| HttpError::Io {
            context: "write control reply",
            source: err,
        })?;
    socket.flush().await.map_err(|err| HttpError::Io {
        context: "flush control reply",
        source: err,
    })
}
