// src/docker/client.rs

//! Sources for container snapshots and daemon info
//!
//! [`DaemonClient`] talks to a live daemon, either over its Unix socket
//! (HTTP/1.1 on a Unix stream, driven by a private current-thread runtime) or
//! over TCP with a blocking HTTP client. [`InspectFiles`] reads documents saved
//! with `docker inspect` / `docker info` for offline conversion.
//!
//! Each call is a single request: no retries, no pooling.

use super::{ContainerSnapshot, DaemonInfo};
use crate::error::{Error, Result};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

/// Daemon socket used when no host is configured
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

const USER_AGENT: &str = concat!("riddler/", env!("CARGO_PKG_VERSION"));

/// Errors from a single daemon request
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Host string is not a supported endpoint
    #[error("unsupported daemon host {0:?} (expected unix://, tcp://, http:// or https://)")]
    UnsupportedHost(String),

    /// Could not reach the daemon socket
    #[error("cannot connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// HTTP exchange over the Unix socket failed
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Request could not be constructed
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    /// HTTP exchange over TCP failed
    #[error("HTTP error: {0}")]
    Tcp(#[from] reqwest::Error),

    /// Daemon answered with a non-success status
    #[error("daemon returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response or file body is not the expected document
    #[error("invalid daemon document: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local I/O error (runtime setup, reading saved documents)
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// ID prefix matches more than one saved container
    #[error("multiple containers found with provided prefix: {0}")]
    Ambiguous(String),

    /// Saved inspect output holds no matching container
    #[error("no such container: {0}")]
    NotFound(String),
}

/// Where container snapshots and daemon info come from
pub trait DaemonSource {
    /// Inspect one container by name or ID
    fn inspect_container(&self, reference: &str) -> Result<ContainerSnapshot>;

    /// Fetch daemon-wide information
    fn info(&self) -> Result<DaemonInfo>;
}

/// Error body returned by the daemon API
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    fn parse(host: &str) -> std::result::Result<Self, DaemonError> {
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DaemonError::UnsupportedHost(host.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = host.strip_prefix("tcp://") {
            return Ok(Self::Tcp(format!("http://{}", addr.trim_end_matches('/'))));
        }
        if host.starts_with("http://") || host.starts_with("https://") {
            return Ok(Self::Tcp(host.trim_end_matches('/').to_string()));
        }
        if host.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(host)));
        }
        Err(DaemonError::UnsupportedHost(host.to_string()))
    }
}

/// Client for a running daemon
#[derive(Debug)]
pub struct DaemonClient {
    endpoint: Endpoint,
}

impl DaemonClient {
    /// Create a client for a host string such as `unix:///var/run/docker.sock`
    pub fn from_host(host: &str) -> Result<Self> {
        let endpoint =
            Endpoint::parse(host).map_err(|e| Error::fetch("connecting to the daemon", e))?;
        debug!("Using daemon endpoint {:?}", endpoint);
        Ok(Self { endpoint })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, DaemonError> {
        let (status, body) = match &self.endpoint {
            Endpoint::Unix(socket) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(unix_get(socket, path))?
            }
            Endpoint::Tcp(base) => tcp_get(base, path)?,
        };

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
            return Err(DaemonError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl DaemonSource for DaemonClient {
    fn inspect_container(&self, reference: &str) -> Result<ContainerSnapshot> {
        debug!("Inspecting container {}", reference);
        self.get(&format!("/containers/{}/json", reference))
            .map_err(|e| Error::fetch(format!("inspecting container ({})", reference), e))
    }

    fn info(&self) -> Result<DaemonInfo> {
        debug!("Fetching daemon info");
        self.get("/info")
            .map_err(|e| Error::fetch("getting daemon info", e))
    }
}

/// One GET over the daemon's Unix socket
async fn unix_get(
    socket: &Path,
    path: &str,
) -> std::result::Result<(StatusCode, Bytes), DaemonError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|source| DaemonError::Connect {
            path: socket.to_path_buf(),
            source,
        })?;

    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("Daemon connection closed with error: {}", e);
        }
    });

    let request = Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, "docker")
        .header(header::USER_AGENT, USER_AGENT)
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, body))
}

/// One GET over TCP
fn tcp_get(base: &str, path: &str) -> std::result::Result<(StatusCode, Bytes), DaemonError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()?;
    let response = client.get(format!("{}{}", base, path)).send()?;
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.bytes()?;
    Ok((status, Bytes::from(body.to_vec())))
}

/// Saved daemon documents for offline conversion
#[derive(Debug, Clone)]
pub struct InspectFiles {
    inspect: PathBuf,
    info: Option<PathBuf>,
}

impl InspectFiles {
    /// `inspect` holds `docker inspect` output; `info` holds `docker info --format '{{json .}}'`
    pub fn new(inspect: impl Into<PathBuf>, info: Option<PathBuf>) -> Self {
        Self {
            inspect: inspect.into(),
            info,
        }
    }

    fn load_snapshots(&self) -> std::result::Result<Vec<ContainerSnapshot>, DaemonError> {
        let data = fs::read(&self.inspect)?;
        let value: serde_json::Value = serde_json::from_slice(&data)?;
        if value.is_array() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(vec![serde_json::from_value(value)?])
        }
    }
}

/// Pick the container `reference` names: exact ID or name first, then a unique ID prefix
fn select_container(
    mut snapshots: Vec<ContainerSnapshot>,
    reference: &str,
) -> std::result::Result<ContainerSnapshot, DaemonError> {
    if let Some(exact) = snapshots.iter().position(|s| s.matches_exactly(reference)) {
        return Ok(snapshots.swap_remove(exact));
    }

    let mut candidates: Vec<ContainerSnapshot> =
        snapshots.into_iter().filter(|s| s.matches(reference)).collect();
    match candidates.len() {
        0 => Err(DaemonError::NotFound(reference.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(DaemonError::Ambiguous(reference.to_string())),
    }
}

impl DaemonSource for InspectFiles {
    fn inspect_container(&self, reference: &str) -> Result<ContainerSnapshot> {
        let operation = format!("inspecting container ({})", reference);
        let mut snapshots = self
            .load_snapshots()
            .map_err(|e| Error::fetch(operation.as_str(), e))?;

        // A single saved document is taken as the requested container
        if snapshots.len() == 1 {
            if !snapshots[0].matches(reference) {
                debug!(
                    "{} holds one container ({}), using it for {}",
                    self.inspect.display(),
                    snapshots[0].display_name(),
                    reference
                );
            }
            return Ok(snapshots.remove(0));
        }
        select_container(snapshots, reference).map_err(|e| Error::fetch(operation, e))
    }

    fn info(&self) -> Result<DaemonInfo> {
        let Some(path) = &self.info else {
            debug!("No daemon info file given, using defaults");
            return Ok(DaemonInfo::default());
        };
        let load = || -> std::result::Result<DaemonInfo, DaemonError> {
            Ok(serde_json::from_slice(&fs::read(path)?)?)
        };
        load().map_err(|e| Error::fetch("getting daemon info", e))
    }
}
