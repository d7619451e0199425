//! JSON control plane: start, stop and observe runs over plain HTTP/1.1.
mod http;
mod routes;


use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::controller::TestController;
use crate::error::{AppError, AppResult, HttpError};

use http::{read_request, write_reply};
use routes::{Reply, route};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// How long a client may take to send a complete request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Binds the control listener.
///
/// # Errors
///
/// Returns an error when the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> AppResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::http(HttpError::BindListener { addr, source: err }))
}

/// Accepts control connections until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error when the listener's local address cannot be read.
pub async fn serve<F>(
    listener: TcpListener,
    controller: Arc<TestController>,
    auth_token: Option<String>,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()>,
{
    let local_addr = listener.local_addr().map_err(|err| {
        AppError::http(HttpError::Io {
            context: "read control listener address",
            source: err,
        })
    })?;
    info!("Control plane listening on http://{}", local_addr);
    let auth_token: Option<Arc<str>> = auth_token.map(Arc::from);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!("Control connection from {}", peer);
                    let controller = Arc::clone(&controller);
                    let auth_token = auth_token.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, &controller, auth_token.as_deref()).await;
                    });
                }
                Err(err) => warn!("Failed to accept control connection: {}", err),
            },
        }
    }

    info!("Control plane shutting down");
    Ok(())
}

async fn handle_connection(
    mut socket: TcpStream,
    controller: &TestController,
    auth_token: Option<&str>,
) {
    let reply = match read_request(&mut socket, REQUEST_READ_TIMEOUT).await {
        Ok(request) => route(&request, controller, auth_token).await,
        Err(err) => {
            debug!("Rejected control request: {} {}", err.status, err.message);
            Reply::error(err.status, &err.message)
        }
    };
    if let Err(err) = write_reply(&mut socket, &reply).await {
        debug!("Control client went away: {}", err);
    }
}
