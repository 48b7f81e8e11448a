//! Connection management.

use crate::error::ClientError;
use flexpage_protocol::message::*;
use flexpage_protocol::{Decoder, Encoder, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Features this client asks for during HELLO.
const CLIENT_FEATURES: &[&str] = &["retune_memo", "frequency_override", "batch"];

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout. Covers time spent in the server's transmit queue.
    pub request_timeout: Duration,
    /// Client name for HELLO.
    pub client_name: Option<String>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            client_name: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A connection to a flexpage server.
pub struct Connection {
    config: ConnectionConfig,
    /// Write half of the stream (for sending requests).
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Read half of the stream (for receiving responses).
    reader: Mutex<Option<OwnedReadHalf>>,
    /// Decoder for parsing responses.
    decoder: Mutex<Decoder>,
    /// Pending requests waiting for responses.
    pending: Mutex<HashMap<String, oneshot::Sender<Response>>>,
    /// Next request ID.
    next_id: AtomicU64,
    /// Is the connection established?
    connected: AtomicBool,
    /// Server's answer to HELLO.
    hello: Mutex<Option<HelloResult>>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            decoder: Mutex::new(Decoder::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            hello: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server and performs the handshake.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        *self.reader.lock().await = Some(read_half);
        *self.decoder.lock().await = Decoder::new();

        // read_loop is not running yet, so the handshake reads its own response
        tracing::debug!("Starting protocol handshake...");
        let hello = self.handshake().await?;
        tracing::debug!(
            "Handshake complete: {} {} ({})",
            hello.server_name,
            hello.server_version,
            hello.wire_mode
        );
        *self.hello.lock().await = Some(hello);

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn handshake(&self) -> Result<HelloResult, ClientError> {
        let hello = HelloParams {
            protocol_version: PROTOCOL_VERSION,
            client_name: self.config.client_name.clone(),
            wire_modes: vec!["binary_json".to_string()],
            features: CLIENT_FEATURES.iter().map(|f| f.to_string()).collect(),
        };

        let id = self.next_id();
        let request = Request::new(&id, Operation::Hello).with_params(serde_json::to_value(hello)?);
        self.send(&request).await?;

        let response = self.read_single_response().await?;
        let result = into_result(response)?;
        Ok(serde_json::from_value(result)?)
    }

    /// Reads a single response from the stream with timeout.
    async fn read_single_response(&self) -> Result<Response, ClientError> {
        let buffer_size = self.config.read_buffer_size;
        let timeout = self.config.request_timeout;

        tokio::time::timeout(timeout, async {
            let mut buf = vec![0u8; buffer_size];

            loop {
                let n = {
                    let mut reader_guard = self.reader.lock().await;
                    let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                    reader.read(&mut buf).await.map_err(ClientError::Io)?
                };

                if n == 0 {
                    tracing::debug!("Connection closed (0 bytes)");
                    return Err(ClientError::ConnectionClosed);
                }

                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);
                if let Some(response) = decoder.decode_response()? {
                    return Ok(response);
                }
            }
        })
        .await
        .map_err(|_| {
            tracing::debug!("Read timeout");
            ClientError::Timeout
        })?
    }

    async fn send(&self, request: &Request) -> Result<(), ClientError> {
        let encoded = Encoder::encode_request(request)?;
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(&encoded).await?;
        tracing::debug!(
            "Request id={} sent ({} bytes)",
            request.id,
            encoded.len()
        );
        Ok(())
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Sends a request and waits for its response.
    ///
    /// Needs [`read_loop`](Self::read_loop) running to deliver the response.
    pub async fn request(
        &self,
        op: Operation,
        params: serde_json::Value,
    ) -> Result<Response, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id();
        let request = Request::new(&id, op).with_params(params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.send(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                tracing::debug!("Request id={} channel closed", id);
                Err(ClientError::ConnectionClosed)
            }
            Err(_) => {
                tracing::debug!("Request id={} timed out", id);
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads and dispatches responses (call this in a background task).
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = {
                let mut reader_guard = self.reader.lock().await;
                let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                reader.read(&mut buf).await.map_err(ClientError::Io)?
            };

            if n == 0 {
                tracing::debug!("read_loop: connection closed");
                self.connected.store(false, Ordering::SeqCst);
                // wake waiters with ConnectionClosed
                self.pending.lock().await.clear();
                return Err(ClientError::ConnectionClosed);
            }

            let mut responses = Vec::new();
            {
                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);
                while let Some(response) = decoder.decode_response()? {
                    responses.push(response);
                }
            }

            let mut pending = self.pending.lock().await;
            for response in responses {
                match pending.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => {
                        tracing::debug!("read_loop: no pending request for id={}", response.id)
                    }
                }
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Returns the server's HELLO result once connected.
    pub async fn hello_result(&self) -> Option<HelloResult> {
        self.hello.lock().await.clone()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        let _ = self.reader.lock().await.take();

        let mut pending = self.pending.lock().await;
        tracing::debug!("Clearing {} pending requests", pending.len());
        pending.clear();

        Ok(())
    }

    /// Returns the number of pending requests.
    pub fn pending_count(&self) -> usize {
        self.pending.try_lock().map(|p| p.len()).unwrap_or(0)
    }
}

/// Turns an error response into a [`ClientError`].
pub(crate) fn into_result(response: Response) -> Result<serde_json::Value, ClientError> {
    if response.is_error() {
        return Err(match response.error {
            Some(err) => err.into(),
            None => ClientError::ServerError {
                code: flexpage_protocol::ErrorCode::InternalError,
                message: "error response without details".to_string(),
                retryable: false,
            },
        });
    }
    Ok(response.result.unwrap_or(serde_json::Value::Null))
}
