//! Encoder error types.

use crate::speed::Phase;
use thiserror::Error;

/// Errors from the FLEX encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid capcode: {capcode}")]
    InvalidCapcode { capcode: u32 },

    #[error("message too long: {words} words (max {limit})")]
    MessageTooLong { words: usize, limit: usize },

    #[error("unsupported baud rate: {baud_rate}")]
    UnsupportedBaudRate { baud_rate: u32 },

    #[error("too many recipients: {count} (max {limit})")]
    TooManyRecipients { count: usize, limit: usize },

    #[error("capcode {capcode} is not scheduled in frame {frame} phase {phase}")]
    SlotConflict { capcode: u32, frame: u8, phase: Phase },

    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("invalid codec input: {reason}")]
    InvalidInput { reason: String },

    #[error("encoding fault: {reason}")]
    EncodingFault { reason: String },
}

impl EncodeError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        EncodeError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_message(reason: impl Into<String>) -> Self {
        EncodeError::InvalidMessage {
            reason: reason.into(),
        }
    }

    pub(crate) fn fault(reason: impl Into<String>) -> Self {
        EncodeError::EncodingFault {
            reason: reason.into(),
        }
    }

    /// Returns whether this error indicates a bug in the encoder rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self, EncodeError::EncodingFault { .. })
    }

    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            EncodeError::InvalidCapcode { .. } => "INVALID_CAPCODE",
            EncodeError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
            EncodeError::UnsupportedBaudRate { .. } => "UNSUPPORTED_BAUD_RATE",
            EncodeError::TooManyRecipients { .. } => "TOO_MANY_RECIPIENTS",
            EncodeError::SlotConflict { .. } => "SLOT_CONFLICT",
            EncodeError::InvalidMessage { .. } => "INVALID_MESSAGE",
            EncodeError::InvalidInput { .. } => "ENCODING_FAULT",
            EncodeError::EncodingFault { .. } => "ENCODING_FAULT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            EncodeError::InvalidCapcode { capcode: 0 }.error_code(),
            "INVALID_CAPCODE"
        );
        assert_eq!(
            EncodeError::MessageTooLong {
                words: 90,
                limit: 85
            }
            .error_code(),
            "MESSAGE_TOO_LONG"
        );
        assert_eq!(
            EncodeError::UnsupportedBaudRate { baud_rate: 9600 }.error_code(),
            "UNSUPPORTED_BAUD_RATE"
        );
        assert_eq!(
            EncodeError::invalid_message("bad digit").error_code(),
            "INVALID_MESSAGE"
        );
        assert_eq!(EncodeError::fault("x").error_code(), "ENCODING_FAULT");
        assert_eq!(
            EncodeError::SlotConflict {
                capcode: 129,
                frame: 0,
                phase: Phase::A
            }
            .error_code(),
            "SLOT_CONFLICT"
        );
    }

    #[test]
    fn test_defect_classification() {
        assert!(EncodeError::fault("overflow").is_defect());
        assert!(!EncodeError::invalid_input("too wide").is_defect());
        assert!(!EncodeError::InvalidCapcode { capcode: 7 }.is_defect());
    }

    #[test]
    fn test_error_display() {
        let err = EncodeError::MessageTooLong {
            words: 90,
            limit: 85,
        };
        assert!(err.to_string().contains("90"));
        assert!(err.to_string().contains("85"));

        let err = EncodeError::UnsupportedBaudRate { baud_rate: 9600 };
        assert!(err.to_string().contains("9600"));
    }
}
