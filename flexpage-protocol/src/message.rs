//! JSON message types for FPP requests and responses.

use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FPP operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    // Session management
    Hello,
    Ping,
    Bye,

    // Server info
    Info,

    // Paging
    Encode,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Hello => "HELLO",
            Operation::Ping => "PING",
            Operation::Bye => "BYE",
            Operation::Info => "INFO",
            Operation::Encode => "ENCODE",
        }
    }
}

/// Request message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Message type, always "request".
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Unique request ID for correlation.
    pub id: String,

    /// Operation to perform.
    pub op: Operation,

    /// Operation-specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, op: Operation) -> Self {
        Self {
            msg_type: "request".to_string(),
            id: id.into(),
            op,
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,

    /// Whether this error is retryable.
    pub retryable: bool,

    /// Additional error details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            retryable: code.is_retryable(),
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Response metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Server timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<DateTime<Utc>>,

    /// Time the request spent in the transmit queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_ms: Option<u64>,

    /// Additional metadata fields (for forward compatibility).
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ResponseMeta {
    fn is_empty(&self) -> bool {
        self.server_time.is_none() && self.queue_ms.is_none() && self.extra.is_empty()
    }
}

/// Response message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Message type, always "response".
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Request ID this response correlates to.
    pub id: String,

    /// Response status.
    pub status: ResponseStatus,

    /// Result payload (for successful responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details (for error responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,

    /// Response metadata.
    #[serde(default, skip_serializing_if = "ResponseMeta::is_empty")]
    pub meta: ResponseMeta,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Ok,
            result: Some(result),
            error: None,
            meta: ResponseMeta::default(),
        }
    }

    pub fn error(id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Error,
            result: None,
            error: Some(error),
            meta: ResponseMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }
}

// ============================================================================
// Operation-specific parameter types
// ============================================================================

/// Parameters for HELLO request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloParams {
    pub protocol_version: u16,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub wire_modes: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Result for HELLO response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResult {
    pub protocol_version: u16,
    pub wire_mode: String,
    pub server_name: String,
    pub server_version: String,
    pub features: Vec<String>,
}

/// Result for INFO response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResult {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: u16,
    pub features: Vec<String>,
    pub max_frame_bytes: u32,
    pub center_frequency_hz: u64,
    pub baud_rates: Vec<u32>,
    pub queue_capacity: usize,
    pub sink: String,
}

/// Message type selector in ENCODE params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ToneOnly,
    Numeric,
    Alphanumeric,
}

/// Page payload in ENCODE params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageParams {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MessageParams {
    pub fn tone_only() -> Self {
        Self {
            kind: MessageType::ToneOnly,
            text: None,
        }
    }

    pub fn numeric(text: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Numeric,
            text: Some(text.into()),
        }
    }

    pub fn alphanumeric(text: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Alphanumeric,
            text: Some(text.into()),
        }
    }
}

fn default_baud_rate() -> u32 {
    1600
}

/// Parameters for ENCODE request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeParams {
    pub capcode: u32,
    /// Further recipients of the same message in the same frame slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_capcodes: Vec<u32>,
    pub message: MessageParams,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u64>,
}

impl EncodeParams {
    pub fn new(capcode: u32, message: MessageParams) -> Self {
        Self {
            capcode,
            extra_capcodes: Vec::new(),
            message,
            baud_rate: default_baud_rate(),
            frequency_hz: None,
            cycle_count: None,
        }
    }
}

/// Result for ENCODE response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeResult {
    /// Symbols packed four per byte, hex encoded.
    pub symbols: String,
    pub symbol_count: usize,
    pub symbol_rate: u32,
    pub baud_rate: u32,
    pub cycle: u8,
    pub frame: u8,
    pub phase: String,
    /// Start of the frame slot relative to the top of the hour.
    pub frame_offset_ms: i64,
    /// When the first symbol was scheduled to leave.
    pub starts_at: DateTime<Utc>,
    /// Capcodes addressed in the frame, primary first.
    #[serde(default)]
    pub recipients: Vec<u32>,
    /// Whether a radio command preceded the symbols.
    pub retuned: bool,
    pub center_frequency_hz: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("1", Operation::Ping);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""op":"PING""#));
        assert!(json.contains(r#""type":"request""#));
    }

    #[test]
    fn test_operation_names() {
        for op in [
            Operation::Hello,
            Operation::Ping,
            Operation::Bye,
            Operation::Info,
            Operation::Encode,
        ] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_response_ok_serialization() {
        let resp = Response::ok("1", json!({"pong": true}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""pong":true"#));
        assert!(!json.contains("meta"));
    }

    #[test]
    fn test_response_error_serialization() {
        let err = ResponseError::new(ErrorCode::MessageTooLong, "message needs 90 words")
            .with_detail("limit", 85);
        let resp = Response::error("1", err);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""code":"MESSAGE_TOO_LONG""#));
        assert!(json.contains(r#""retryable":false"#));
        assert!(json.contains(r#""limit":85"#));

        let busy = ResponseError::new(ErrorCode::Busy, "queue full");
        assert!(busy.retryable);
    }

    #[test]
    fn test_response_meta() {
        let meta = ResponseMeta {
            queue_ms: Some(12),
            ..Default::default()
        };
        let resp = Response::ok("1", json!({})).with_meta(meta);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["meta"]["queue_ms"], 12);
    }

    #[test]
    fn test_encode_params_defaults() {
        let params: EncodeParams = serde_json::from_value(json!({
            "capcode": 425321,
            "message": {"type": "alphanumeric", "text": "GRAND CENTRAL"}
        }))
        .unwrap();
        assert_eq!(params.baud_rate, 1600);
        assert_eq!(params.frequency_hz, None);
        assert_eq!(params.cycle_count, None);
        assert!(params.extra_capcodes.is_empty());
        assert_eq!(params.message, MessageParams::alphanumeric("GRAND CENTRAL"));

        let tone: EncodeParams = serde_json::from_value(json!({
            "capcode": 1,
            "message": {"type": "tone_only"},
            "baud_rate": 6400
        }))
        .unwrap();
        assert_eq!(tone.message, MessageParams::tone_only());
        assert_eq!(tone.baud_rate, 6400);
    }

    #[test]
    fn test_encode_params_serialization() {
        let params = EncodeParams::new(42, MessageParams::numeric("12345"));
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["message"]["type"], "numeric");
        assert_eq!(value["message"]["text"], "12345");
        assert!(value.get("frequency_hz").is_none());
        assert!(value.get("extra_capcodes").is_none());

        let mut batch = params;
        batch.extra_capcodes = vec![170];
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["extra_capcodes"], json!([170]));
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let result: Result<EncodeParams, _> = serde_json::from_value(json!({
            "capcode": 1,
            "message": {"type": "binary"}
        }));
        assert!(result.is_err());
    }
}
