//! # flexpage-protocol
//!
//! Wire protocol for the flexpage paging server (FPP - FLEX Page Protocol).
//!
//! This crate provides:
//! - Binary framing with length prefix and CRC32C validation
//! - JSON message serialization/deserialization
//! - Request/Response envelope types and ENCODE parameters
//! - Error codes and protocol constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use message::{Operation, Request, Response, ResponseError, ResponseMeta, ResponseStatus};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for the flexpage server.
pub const DEFAULT_PORT: u16 = 7464;

/// Maximum frame payload size (4 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;
