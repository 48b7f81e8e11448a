//! # flexpage-core
//!
//! FLEX paging encoder.
//!
//! This crate provides:
//! - BCH(31,21) word coding, FLEX checksums and block interleaving
//! - Capcode validation and address word formatting
//! - Tone-only, numeric and alphanumeric message field encoding
//! - Frame/cycle/phase scheduling from a capcode
//! - Frame assembly and 2/4-level FSK symbol serialization
//! - The encode pipeline with its radio retune memo

pub mod address;
pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod pipeline;
pub mod scheduler;
pub mod speed;
pub mod symbols;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use address::Capcode;
pub use error::EncodeError;
pub use frame::FlexFrame;
pub use message::{encode_message, EncodedMessage, Message, MessageKind};
pub use pipeline::{
    EncodeRequest, EncoderConfig, FlexEncoder, PreparedFrame, RadioCommand, Transmission,
};
pub use scheduler::{cycle_count_at, schedule, upcoming_cycle_count, FrameAddress};
pub use speed::{FlexSpeed, Phase};
pub use symbols::SymbolStream;

/// Result alias used throughout the encoder.
pub type Result<T> = std::result::Result<T, EncodeError>;
