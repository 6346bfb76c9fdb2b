//! JSON control interface over a Unix socket and, optionally, TCP.
//!
//! Clients send one JSON request per line and receive one JSON response per
//! line:
//!
//! ```text
//! -> {"command": "set_brightness", "params": {"brightness": 70}}
//! <- {"version":"1.0","status":"success","message":"Brightness set successfully","data":{"brightness":70}}
//! ```
//!
//! Requests are validated here. Accepted control commands are handed to the
//! bounded [`CommandSender`] and take effect on the next tick. `get_status` and
//! `get_config` are answered from a [`StatusSnapshot`] the control loop
//! publishes after every tick, so the socket threads never touch loop state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::command::{CommandSender, QueueError};
use crate::config::Config;
use crate::constants::*;
use crate::logger::Log;
use crate::mode::{Command, OperatingMode, RequestedMode};

/// Loop state visible to control clients.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub mode: OperatingMode,
    pub brightness: u8,
    pub lux: Option<f32>,
    pub zone: Option<String>,
    pub manual_brightness: u8,
    pub last_auto_brightness: u8,
    /// Time left before a temporary override reverts to AUTO.
    pub auto_resume_remaining: Option<Duration>,
}

pub type SharedStatus = Arc<Mutex<StatusSnapshot>>;

/// Static configuration facts reported by `get_config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub update_interval_ms: u64,
    pub auto_resume_timeout_sec: u64,
    pub hysteresis_percent: f32,
    pub zones: Vec<String>,
}

impl From<&Config> for ConfigSummary {
    fn from(config: &Config) -> Self {
        Self {
            update_interval_ms: config.update_interval().as_millis() as u64,
            auto_resume_timeout_sec: config.auto_resume_timeout().as_secs(),
            hysteresis_percent: config.hysteresis_percent(),
            zones: config.zones.iter().map(|zone| zone.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    command: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub version: String,
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    fn success(message: &str, data: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            status: ResponseStatus::Success,
            message: message.to_string(),
            data: Some(data),
        }
    }

    fn error(error: &RequestError) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            status: ResponseStatus::Error,
            message: error.to_string(),
            data: Some(json!({ "error_code": error.error_code() })),
        }
    }
}

/// Why a request was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("JSON parse error: {0}")]
    Parse(String),
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    #[error("Missing '{0}' parameter")]
    MissingParam(&'static str),
    #[error("{0}")]
    InvalidParam(String),
    #[error("Command rejected: {0}")]
    Queue(#[from] QueueError),
    #[error("Request exceeds {0} bytes")]
    TooLong(u64),
}

impl RequestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::Parse(_) | RequestError::TooLong(_) => "PARSE_ERROR",
            RequestError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            RequestError::MissingParam(_) | RequestError::InvalidParam(_) => "INVALID_PARAMS",
            RequestError::Queue(QueueError::Full) => "QUEUE_FULL",
            RequestError::Queue(QueueError::Disconnected) => "UNAVAILABLE",
        }
    }
}

/// Everything a request handler needs, shared by all client threads.
#[derive(Clone)]
pub struct ControlContext {
    pub sender: CommandSender,
    pub status: SharedStatus,
    pub config: Arc<ConfigSummary>,
}

fn integer_param(params: &Value, name: &'static str) -> Result<i64, RequestError> {
    let value = params.get(name).ok_or(RequestError::MissingParam(name))?;
    value
        .as_i64()
        .ok_or_else(|| RequestError::InvalidParam(format!("'{}' must be an integer", name)))
}

fn snapshot(context: &ControlContext) -> StatusSnapshot {
    match context.status.lock() {
        Ok(status) => status.clone(),
        // A panicked loop thread leaves the last published values readable
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn dispatch(request: Request, context: &ControlContext) -> Result<Response, RequestError> {
    match request.command.as_str() {
        "get_status" => {
            let status = snapshot(context);
            let remaining = status.auto_resume_remaining.map(|d| d.as_secs());
            Ok(Response::success(
                "Status retrieved successfully",
                json!({
                    "mode": status.mode.as_str(),
                    "brightness": status.brightness,
                    "lux": status.lux,
                    "zone": status.zone,
                    "auto_resume_remaining_sec": remaining,
                }),
            ))
        }
        "get_config" => {
            let status = snapshot(context);
            Ok(Response::success(
                "Configuration retrieved successfully",
                json!({
                    "mode": status.mode.as_str(),
                    "manual_brightness": status.manual_brightness,
                    "last_auto_brightness": status.last_auto_brightness,
                    "control": context.config.as_ref(),
                }),
            ))
        }
        "set_mode" => {
            let name = request
                .params
                .get("mode")
                .ok_or(RequestError::MissingParam("mode"))?
                .as_str()
                .unwrap_or_default();
            let mode = RequestedMode::from_name(name).ok_or_else(|| {
                RequestError::InvalidParam("Mode must be 'auto' or 'manual'".to_string())
            })?;
            context.sender.try_send(Command::SetMode(mode))?;
            Ok(Response::success("Mode set successfully", json!({ "mode": name })))
        }
        "set_brightness" => {
            let brightness = integer_param(&request.params, "brightness")?;
            let brightness = u8::try_from(brightness)
                .ok()
                .filter(|value| *value <= MAXIMUM_BRIGHTNESS)
                .ok_or_else(|| RequestError::InvalidParam("Brightness must be 0-100".to_string()))?;
            context.sender.try_send(Command::SetBrightness(brightness))?;
            Ok(Response::success(
                "Brightness set successfully",
                json!({ "brightness": brightness }),
            ))
        }
        "adjust_brightness" => {
            let delta = integer_param(&request.params, "delta")?;
            let delta = i16::try_from(delta)
                .ok()
                .filter(|value| (MINIMUM_ADJUST_DELTA..=MAXIMUM_ADJUST_DELTA).contains(value))
                .ok_or_else(|| {
                    RequestError::InvalidParam(format!(
                        "Delta must be {} to {}",
                        MINIMUM_ADJUST_DELTA, MAXIMUM_ADJUST_DELTA
                    ))
                })?;
            context.sender.try_send(Command::AdjustBrightness(delta))?;
            Ok(Response::success(
                "Brightness adjusted successfully",
                json!({ "delta": delta }),
            ))
        }
        other => Err(RequestError::UnknownCommand(other.to_string())),
    }
}

/// Handle one request line. Never fails; errors become error responses.
pub fn handle_request(line: &str, context: &ControlContext) -> Response {
    let result = serde_json::from_str::<Request>(line)
        .map_err(|e| RequestError::Parse(e.to_string()))
        .and_then(|request| dispatch(request, context));

    match result {
        Ok(response) => response,
        Err(e) => {
            Log::log_debug(&format!("Rejected control request: {}", e));
            Response::error(&e)
        }
    }
}

/// A connected client stream of either transport.
trait ClientStream: Read + Write + Send + Sized + 'static {
    fn clone_stream(&self) -> io::Result<Self>;
    fn set_timeout(&self, timeout: Duration) -> io::Result<()>;
}

impl ClientStream for UnixStream {
    fn clone_stream(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

impl ClientStream for TcpStream {
    fn clone_stream(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

/// Answer request lines until the client disconnects.
///
/// A line longer than [`MAX_REQUEST_BYTES`] gets an error response and ends
/// the connection.
fn serve_lines<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    context: &ControlContext,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_REQUEST_BYTES + 1)
            .read_until(b'\n', &mut buf)
            .context("Failed to read from control client")?;
        if read == 0 {
            return Ok(());
        }

        let complete = buf.last() == Some(&b'\n');
        if !complete && buf.len() as u64 > MAX_REQUEST_BYTES {
            let response = Response::error(&RequestError::TooLong(MAX_REQUEST_BYTES));
            write_response(&mut writer, &response)?;
            anyhow::bail!("Request exceeded {} bytes", MAX_REQUEST_BYTES);
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_request(line.trim_end(), context);
        write_response(&mut writer, &response)?;
    }
}

fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let mut encoded =
        serde_json::to_string(response).context("Failed to encode control response")?;
    encoded.push('\n');
    writer
        .write_all(encoded.as_bytes())
        .context("Failed to write control response")
}

fn serve_client<S: ClientStream>(stream: S, context: &ControlContext) -> Result<()> {
    stream
        .set_timeout(Duration::from_millis(SOCKET_READ_TIMEOUT_MS))
        .context("Failed to set client read timeout")?;
    let writer = stream.clone_stream().context("Failed to clone client stream")?;
    serve_lines(stream, writer, context)
}

/// Decrements the live client count when a client thread ends.
struct ClientSlot(Arc<AtomicUsize>);

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept clients from `incoming`, one thread per client, refusing clients
/// beyond [`MAX_CONTROL_CLIENTS`].
fn accept_clients<S, I>(incoming: I, context: ControlContext)
where
    S: ClientStream,
    I: Iterator<Item = io::Result<S>>,
{
    let clients = Arc::new(AtomicUsize::new(0));
    for stream in incoming {
        match stream {
            Ok(stream) => {
                if clients.fetch_add(1, Ordering::SeqCst) >= MAX_CONTROL_CLIENTS {
                    clients.fetch_sub(1, Ordering::SeqCst);
                    Log::log_debug("Control client refused: too many connections");
                    continue;
                }
                let slot = ClientSlot(Arc::clone(&clients));
                let context = context.clone();
                thread::spawn(move || {
                    let _slot = slot;
                    if let Err(e) = serve_client(stream, &context) {
                        Log::log_debug(&format!("Control client disconnected: {:#}", e));
                    }
                });
            }
            Err(e) => Log::log_warning(&format!("Control socket accept failed: {}", e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

/// Listening control endpoint. The accept loop runs on its own thread and each
/// client is served on a separate thread.
pub struct ControlServer {
    endpoint: Endpoint,
}

impl ControlServer {
    /// Listen on a Unix socket at `path`.
    pub fn start(path: &Path, context: ControlContext) -> Result<Self> {
        if path.exists() {
            // Left behind by a previous run; the instance lock guarantees it is stale
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
        }
        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind control socket {}", path.display()))?;

        thread::spawn(move || accept_clients(listener.incoming(), context));

        Log::log_decorated(&format!("Control socket listening on {}", path.display()));
        Ok(Self {
            endpoint: Endpoint::Unix(path.to_path_buf()),
        })
    }

    /// Listen on a TCP address. Port 0 binds an ephemeral port.
    pub fn start_tcp(addr: SocketAddr, context: ControlContext) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .with_context(|| format!("Failed to bind TCP control address {}", addr))?;
        let local = listener
            .local_addr()
            .context("Failed to read TCP control address")?;

        thread::spawn(move || accept_clients(listener.incoming(), context));

        Log::log_decorated(&format!("TCP control available on {}", local));
        Ok(Self {
            endpoint: Endpoint::Tcp(local),
        })
    }

    /// Socket file of a Unix endpoint.
    pub fn path(&self) -> Option<&Path> {
        match &self.endpoint {
            Endpoint::Unix(path) => Some(path),
            Endpoint::Tcp(_) => None,
        }
    }

    /// Bound address of a TCP endpoint.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.endpoint {
            Endpoint::Tcp(addr) => Some(addr),
            Endpoint::Unix(_) => None,
        }
    }

    /// Remove the socket file so new clients are refused. No-op for TCP.
    pub fn cleanup(&self) {
        let Endpoint::Unix(path) = &self.endpoint else {
            return;
        };
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                Log::log_warning(&format!(
                    "Failed to remove control socket {}: {}",
                    path.display(),
                    e
                ));
            }
        }
    }
}
