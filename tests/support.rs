use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a lightweight HTTP target answering every request with `status`.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_http_server(status: u16) -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    thread::spawn(move || handle_client(stream, status));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}/", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
        },
    ))
}

fn handle_client(mut stream: TcpStream, status: u16) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let mut buffer = [0u8; 1024];
    if stream.read(&mut buffer).is_err() {
        return;
    }
    let response = format!(
        "HTTP/1.1 {} Test\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK",
        status
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Send one request to a control plane and return the status and JSON body.
///
/// # Errors
///
/// Returns an error if the exchange fails or the response is malformed.
pub fn control_request(
    port: u16,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<(u16, serde_json::Value), String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))
        .map_err(|err| format!("connect failed: {}", err))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|err| format!("set timeout failed: {}", err))?;
    let body = body.unwrap_or_default();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    );
    stream
        .write_all(request.as_bytes())
        .map_err(|err| format!("write failed: {}", err))?;

    let mut raw = String::new();
    stream
        .read_to_string(&mut raw)
        .map_err(|err| format!("read failed: {}", err))?;
    let (head, payload) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| format!("Malformed response: {}", raw))?;
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| format!("Missing status in: {}", head))?;
    let value = if payload.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(payload).map_err(|err| format!("Invalid JSON: {}", err))?
    };
    Ok((status, value))
}

/// Poll the control plane until it accepts connections.
///
/// # Errors
///
/// Returns an error if the server does not come up within `timeout`.
pub fn wait_for_control(port: u16, timeout: Duration) -> Result<(), String> {
    let start = Instant::now();
    loop {
        if let Ok((200, _)) = control_request(port, "GET", "/health", None) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err("control plane did not start".to_owned());
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Run the `traffic-gen` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_traffic_gen<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = traffic_gen_bin()?;
    Command::new(bin)
        .args(args)
        .env("TRAFFIC_GEN_LOG", "error")
        .output()
        .map_err(|err| format!("run traffic-gen failed: {}", err))
}

/// Spawn the `traffic-gen` binary in the background.
///
/// # Errors
///
/// Returns an error if the process cannot be started.
pub fn spawn_traffic_gen<I, S>(args: I) -> Result<Child, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = traffic_gen_bin()?;
    Command::new(bin)
        .args(args)
        .env("TRAFFIC_GEN_LOG", "error")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| format!("spawn traffic-gen failed: {}", err))
}

/// Wait for a child process to exit.
///
/// # Errors
///
/// Returns an error if waiting fails or the timeout is exceeded.
pub fn wait_for_exit(child: &mut Child, timeout: Duration) -> Result<ExitStatus, String> {
    let start = Instant::now();
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|err| format!("wait failed: {}", err))?
        {
            return Ok(status);
        }
        if start.elapsed() > timeout {
            drop(child.kill());
            return Err("process timed out".to_owned());
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Pick an available local TCP port.
///
/// # Errors
///
/// Returns an error if a local port cannot be allocated.
pub fn pick_port() -> Result<u16, String> {
    TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind port failed: {}", err))?
        .local_addr()
        .map_err(|err| format!("port addr failed: {}", err))
        .map(|addr| addr.port())
}

fn traffic_gen_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_traffic-gen").map_or_else(
        || Err("CARGO_BIN_EXE_traffic-gen missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}

/// Ask a child process to terminate the way a service manager would.
///
/// # Errors
///
/// Returns an error if `kill` cannot be run or reports a failure.
#[cfg(unix)]
pub fn send_sigterm(child: &Child) -> Result<(), String> {
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .map_err(|err| format!("run kill failed: {}", err))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("kill exited with {}", status))
    }
}
