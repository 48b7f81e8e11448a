//! # flexpage-server
//!
//! TCP server for flexpage.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Protocol framing and message dispatch
//! - Session management
//! - A bounded transmit queue feeding a single radio sink
//! - Radio sinks (log, raw symbol file)

pub mod config;
pub mod error;
pub mod handler;
pub mod server;
pub mod session;
pub mod sink;
pub mod transmitter;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{
    Config, EncoderSettings, NetworkConfig, RadioConfig, SinkKind, SlotTiming, TransmitConfig,
};
pub use error::ServerError;
pub use handler::{CommandHandler, ServerInfo};
pub use server::{Server, ServerConfig};
pub use session::Session;
pub use sink::{open_sink, FileSink, LogSink, RadioSink, SinkError};
pub use transmitter::{TransmitQueue, TransmitReport};
