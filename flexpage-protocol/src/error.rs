//! Protocol error types and error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 'FLXP', got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,
}

/// Stable error codes returned in error responses.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Protocol errors
    UnsupportedProtocol,
    BadRequest,

    // Page errors
    InvalidCapcode,
    MessageTooLong,
    UnsupportedBaudRate,
    InvalidMessage,
    TooManyRecipients,
    SlotConflict,

    // Transmit errors
    Busy,
    RadioError,

    // System errors
    EncodingFault,
    InternalError,
}

impl ErrorCode {
    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Busy | ErrorCode::RadioError)
    }

    /// Parses a code produced by an error's `error_code()`.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = match code {
            "UNSUPPORTED_PROTOCOL" => ErrorCode::UnsupportedProtocol,
            "BAD_REQUEST" => ErrorCode::BadRequest,
            "INVALID_CAPCODE" => ErrorCode::InvalidCapcode,
            "MESSAGE_TOO_LONG" => ErrorCode::MessageTooLong,
            "UNSUPPORTED_BAUD_RATE" => ErrorCode::UnsupportedBaudRate,
            "INVALID_MESSAGE" => ErrorCode::InvalidMessage,
            "TOO_MANY_RECIPIENTS" => ErrorCode::TooManyRecipients,
            "SLOT_CONFLICT" => ErrorCode::SlotConflict,
            "BUSY" => ErrorCode::Busy,
            "RADIO_ERROR" => ErrorCode::RadioError,
            "ENCODING_FAULT" => ErrorCode::EncodingFault,
            "INTERNAL_ERROR" => ErrorCode::InternalError,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            ErrorCode::BadRequest => write!(f, "BAD_REQUEST"),
            ErrorCode::InvalidCapcode => write!(f, "INVALID_CAPCODE"),
            ErrorCode::MessageTooLong => write!(f, "MESSAGE_TOO_LONG"),
            ErrorCode::UnsupportedBaudRate => write!(f, "UNSUPPORTED_BAUD_RATE"),
            ErrorCode::InvalidMessage => write!(f, "INVALID_MESSAGE"),
            ErrorCode::TooManyRecipients => write!(f, "TOO_MANY_RECIPIENTS"),
            ErrorCode::SlotConflict => write!(f, "SLOT_CONFLICT"),
            ErrorCode::Busy => write!(f, "BUSY"),
            ErrorCode::RadioError => write!(f, "RADIO_ERROR"),
            ErrorCode::EncodingFault => write!(f, "ENCODING_FAULT"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}
