//! High-level client API.

use crate::connection::{into_result, Connection, ConnectionConfig};
use crate::error::ClientError;
use flexpage_protocol::message::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// High-level client for flexpage.
pub struct Client {
    conn: Arc<Connection>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
            read_task: Mutex::new(None),
        }
    }

    /// Connects to the server and starts the background read loop.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await?;

        let conn = self.conn.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = conn.read_loop().await {
                tracing::debug!("Read loop ended: {}", e);
            }
        });
        if let Some(old) = self.read_task.lock().await.replace(task) {
            old.abort();
        }
        Ok(())
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    async fn request(&self, op: Operation, params: Value) -> Result<Value, ClientError> {
        let response = self.conn.request(op, params).await?;
        into_result(response)
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request(Operation::Ping, json!({})).await?;
        Ok(())
    }

    /// Gets server info.
    pub async fn info(&self) -> Result<InfoResult, ClientError> {
        let result = self.request(Operation::Info, json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Encodes and transmits one page.
    ///
    /// Resolves once the page has gone out to the radio.
    pub async fn encode(&self, params: EncodeParams) -> Result<EncodeResult, ClientError> {
        let result = self
            .request(Operation::Encode, serde_json::to_value(params)?)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Ends the session. The server closes the connection afterwards.
    pub async fn bye(&self) -> Result<(), ClientError> {
        self.request(Operation::Bye, json!({})).await?;
        self.close().await
    }
}
