//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::session::{Session, SessionState, WireMode};
use flexpage_protocol::codec::jsonl::{self, LineDecoder};
use flexpage_protocol::{Decoder, Encoder, Request, Response, DEFAULT_PORT};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 64,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// Request decoder for one connection.
///
/// The framing is picked from the first byte a client sends: `{` selects
/// line-delimited JSON, anything else binary frames.
enum Inbound {
    Undecided(Vec<u8>),
    Binary(Decoder),
    Jsonl(LineDecoder),
}

impl Inbound {
    fn new() -> Self {
        Inbound::Undecided(Vec::new())
    }

    fn extend(&mut self, data: &[u8]) {
        match self {
            Inbound::Binary(decoder) => decoder.extend(data),
            Inbound::Jsonl(decoder) => decoder.extend(data),
            Inbound::Undecided(pending) => {
                pending.extend_from_slice(data);
                let Some(first) = pending.iter().find(|b| !b.is_ascii_whitespace()) else {
                    return;
                };
                let mut next = if *first == b'{' {
                    Inbound::Jsonl(LineDecoder::new())
                } else {
                    Inbound::Binary(Decoder::new())
                };
                let pending = std::mem::take(pending);
                next.extend(&pending);
                *self = next;
            }
        }
    }

    fn next_request(&mut self) -> Result<Option<Request>, ServerError> {
        let request = match self {
            Inbound::Undecided(_) => None,
            Inbound::Binary(decoder) => decoder.decode_request()?,
            Inbound::Jsonl(decoder) => decoder.decode_line()?,
        };
        Ok(request)
    }

    fn is_jsonl(&self) -> bool {
        matches!(self, Inbound::Jsonl(_))
    }
}

/// TCP server for flexpage.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server around a command handler.
    pub fn new(config: ServerConfig, handler: Arc<CommandHandler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let idle_timeout = self.config.idle_timeout;
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    tcp_stream,
                                    addr,
                                    handler,
                                    &stats,
                                    idle_timeout,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        stats: &ServerStats,
        idle_timeout: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);
        stream.set_nodelay(true).ok();

        let mut session = Session::new(addr);
        let mut inbound = Inbound::new();
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            inbound.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(idle_timeout) => {
                    if session.idle_duration() > idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            while let Some(request) = inbound.next_request()? {
                tracing::info!("[{}] Request: {:?} (id={})", addr, request.op, request.id);
                stats.requests_total.fetch_add(1, Ordering::Relaxed);

                // a client that leaves mid-request cancels it, queued page included
                let response = {
                    let handling = handler.handle(&mut session, &request);
                    tokio::pin!(handling);
                    loop {
                        tokio::select! {
                            response = &mut handling => break response,
                            result = stream.read(&mut buf) => match result {
                                Ok(0) => {
                                    tracing::info!(
                                        "[{}] Client left during {} (id={}), cancelling",
                                        addr,
                                        request.op.as_str(),
                                        request.id
                                    );
                                    return Ok(());
                                }
                                Ok(n) => inbound.extend(&buf[..n]),
                                Err(e) => return Err(ServerError::Io(e)),
                            },
                            _ = shutdown.recv() => {
                                tracing::debug!("[{}] Shutdown during {}", addr, request.op.as_str());
                                return Err(ServerError::ShuttingDown);
                            }
                        }
                    }
                };

                tracing::info!(
                    "[{}] Response: {} (id={})",
                    addr,
                    if response.is_ok() { "OK" } else { "ERROR" },
                    response.id
                );

                let mode = if inbound.is_jsonl() {
                    WireMode::Jsonl
                } else {
                    session.wire_mode()
                };
                let response_bytes = encode_response(&response, mode)?;

                tracing::debug!("[{}] Writing {} bytes", addr, response_bytes.len());
                stream.write_all(&response_bytes).await?;

                if session.state() == SessionState::Closing {
                    tracing::debug!("[{}] Session closing", addr);
                    return Ok(());
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

fn encode_response(response: &Response, mode: WireMode) -> Result<Vec<u8>, ServerError> {
    let bytes = match mode {
        WireMode::BinaryJson => Encoder::encode_response(response)?.to_vec(),
        WireMode::Jsonl => jsonl::encode(response)?,
    };
    Ok(bytes)
}
