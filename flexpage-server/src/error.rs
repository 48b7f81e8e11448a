//! Server error types.

use crate::sink::SinkError;
use flexpage_core::EncodeError;
use flexpage_protocol::ErrorCode;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] flexpage_protocol::ProtocolError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("radio sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedProtocol(u16),

    #[error("transmit queue full ({capacity} pages waiting)")]
    Busy { capacity: usize },

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(_) => ErrorCode::BadRequest,
            ServerError::Encode(e) => {
                ErrorCode::from_code(e.error_code()).unwrap_or(ErrorCode::InternalError)
            }
            ServerError::Sink(_) => ErrorCode::RadioError,
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::InvalidRequest(_) => ErrorCode::BadRequest,
            ServerError::UnsupportedProtocol(_) => ErrorCode::UnsupportedProtocol,
            ServerError::Busy { .. } => ErrorCode::Busy,
            ServerError::ShuttingDown => ErrorCode::InternalError,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }
}
