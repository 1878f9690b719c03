// TCP line-protocol owner
// reason: tokio for async sockets, async-trait for the ResourceOwner port

use async_trait::async_trait;
use reshandler_core::{HandlerError, MethodTable, ResourceOwner, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Connect timeout when none is configured (5s)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Per-request read/write timeout when none is configured (5s)
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;

/// Connection options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpOptions {
    /// `host:port` to connect to
    pub addr: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_io_timeout_ms() -> u64 {
    DEFAULT_IO_TIMEOUT_MS
}

impl TcpOptions {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
        }
    }
}

/// One open connection; clones share the socket
#[derive(Clone, Debug)]
pub struct TcpConnection {
    id: u64,
    peer: SocketAddr,
    io_timeout: Duration,
    stream: Arc<Mutex<BufStream<TcpStream>>>,
    broken: Arc<AtomicBool>,
}

impl TcpConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Flag the connection so the next validation rejects it
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// Write one line and read one line back
    ///
    /// Any I/O failure or timeout marks the connection broken.
    pub async fn send_line(&self, line: &str) -> Result<String> {
        let mut stream = self.stream.lock().await;
        let exchange = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await?;
            let mut reply = String::new();
            let read = stream.read_line(&mut reply).await?;
            Ok::<_, std::io::Error>((read, reply))
        };

        let outcome = timeout(self.io_timeout, exchange).await;
        match outcome {
            Ok(Ok((0, _))) => {
                self.mark_broken();
                Err(HandlerError::Operation(format!(
                    "connection {} closed by {}",
                    self.id, self.peer
                )))
            }
            Ok(Ok((_, reply))) => Ok(reply.trim_end_matches(['\r', '\n']).to_string()),
            Ok(Err(e)) => {
                self.mark_broken();
                Err(HandlerError::Operation(format!("io error on {}: {e}", self.peer)))
            }
            Err(_) => {
                self.mark_broken();
                Err(HandlerError::Operation(format!(
                    "no reply from {} within {}ms",
                    self.peer,
                    self.io_timeout.as_millis()
                )))
            }
        }
    }
}

/// Owner producing TCP connections
///
/// Registered methods:
/// - `send_line(text)`: send `text`, return the reply line
/// - `peer()`: address of the connected peer
#[derive(Debug, Default)]
pub struct TcpLineOwner {
    next_id: AtomicU64,
}

impl TcpLineOwner {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceOwner for TcpLineOwner {
    type Resource = TcpConnection;
    type Options = TcpOptions;

    async fn acquire_resource(&self, options: &TcpOptions) -> Result<TcpConnection> {
        let connect_timeout = Duration::from_millis(options.connect_timeout_ms);
        let stream = match timeout(connect_timeout, TcpStream::connect(&options.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(HandlerError::Acquisition(format!(
                    "connect to {} failed: {e}",
                    options.addr
                )))
            }
            Err(_) => {
                return Err(HandlerError::Acquisition(format!(
                    "connect to {} timed out after {}ms",
                    options.addr, options.connect_timeout_ms
                )))
            }
        };
        stream
            .set_nodelay(true)
            .map_err(|e| HandlerError::Acquisition(format!("set_nodelay: {e}")))?;
        let peer = stream
            .peer_addr()
            .map_err(|e| HandlerError::Acquisition(format!("peer_addr: {e}")))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(connection_id = id, peer = %peer, "TCP connection established");

        Ok(TcpConnection {
            id,
            peer,
            io_timeout: Duration::from_millis(options.io_timeout_ms),
            stream: Arc::new(Mutex::new(BufStream::new(stream))),
            broken: Arc::new(AtomicBool::new(false)),
        })
    }

    fn is_resource_usable(&self, resource: &TcpConnection) -> Result<bool> {
        if resource.is_broken() {
            return Ok(false);
        }
        // Busy means another call is using it right now
        let Ok(stream) = resource.stream.try_lock() else {
            return Ok(true);
        };
        let socket = stream.get_ref();
        let healthy = socket.peer_addr().is_ok() && matches!(socket.take_error(), Ok(None));
        if !healthy {
            debug!(connection_id = resource.id, "TCP connection failed health check");
        }
        Ok(healthy)
    }

    async fn destroy_resource(&self, resource: TcpConnection) -> Result<()> {
        resource.mark_broken();
        let mut stream = resource.stream.lock().await;
        if let Err(e) = stream.get_mut().shutdown().await {
            // Peer already gone; nothing left to release
            debug!(connection_id = resource.id, error = %e, "Shutdown on dead connection");
        }
        info!(connection_id = resource.id, peer = %resource.peer, "TCP connection closed");
        Ok(())
    }

    fn register_methods(methods: &mut MethodTable<Self>) {
        methods
            .register("send_line", |_owner, conn: TcpConnection, args| async move {
                let line = args.first().and_then(Value::as_str).ok_or_else(|| {
                    HandlerError::Operation("send_line expects a string argument".into())
                })?;
                let reply = conn.send_line(line).await.map_err(|e| {
                    warn!(connection_id = conn.id(), error = %e, "send_line failed");
                    e
                })?;
                Ok(json!(reply))
            })
            .register("peer", |_owner, conn: TcpConnection, _args| async move {
                Ok(json!(conn.peer().to_string()))
            });
    }
}
