//! Command handlers.

use crate::error::ServerError;
use crate::session::{Session, SessionState, WireMode};
use crate::transmitter::{TransmitQueue, TransmitReport};
use chrono::Utc;
use flexpage_core::{EncodeError, EncodeRequest, FlexSpeed, Message};
use flexpage_protocol::message::*;
use flexpage_protocol::{MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{error, warn};

/// Server capabilities and limits.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub features: Vec<String>,
    pub max_frame_bytes: u32,
    /// Channel used when a page names none.
    pub center_frequency_hz: u64,
    pub sink: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "flexpage".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            features: vec![
                "retune_memo".to_string(),
                "frequency_override".to_string(),
                "batch".to_string(),
            ],
            max_frame_bytes: MAX_PAYLOAD_SIZE,
            center_frequency_hz: flexpage_core::pipeline::DEFAULT_CENTER_FREQUENCY_HZ,
            sink: "log".to_string(),
        }
    }
}

/// Command handler.
pub struct CommandHandler {
    queue: TransmitQueue,
    info: ServerInfo,
}

impl CommandHandler {
    /// Creates a new command handler feeding the given transmit queue.
    pub fn new(queue: TransmitQueue) -> Self {
        Self {
            queue,
            info: ServerInfo::default(),
        }
    }

    /// Replaces the advertised server info.
    pub fn with_info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Handles a request and returns a response.
    pub async fn handle(&self, session: &mut Session, request: &Request) -> Response {
        session.record_request();

        let mut meta = ResponseMeta {
            server_time: Some(Utc::now()),
            ..Default::default()
        };

        let result = match request.op {
            Operation::Hello => self.handle_hello(session, &request.params),
            Operation::Ping => Ok(json!({"pong": true})),
            Operation::Bye => {
                session.set_state(SessionState::Closing);
                Ok(json!({"goodbye": true}))
            }
            Operation::Info => self.handle_info(),
            Operation::Encode => self
                .handle_encode(session, &request.params)
                .await
                .map(|(value, report)| {
                    meta.queue_ms = Some(report.queued.as_millis() as u64);
                    value
                }),
        };

        let response = match result {
            Ok(value) => Response::ok(&request.id, value),
            Err(e) => {
                if e.error_code() == flexpage_protocol::ErrorCode::EncodingFault {
                    error!("{} failed with an encoder defect: {}", request.op.as_str(), e);
                }
                Response::error(&request.id, error_response(&e))
            }
        };
        response.with_meta(meta)
    }

    fn handle_hello(&self, session: &mut Session, params: &Value) -> Result<Value, ServerError> {
        let hello: HelloParams = serde_json::from_value(params.clone())
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        if hello.protocol_version != PROTOCOL_VERSION {
            return Err(ServerError::UnsupportedProtocol(hello.protocol_version));
        }

        let wire_mode = WireMode::negotiate(&hello.wire_modes);

        let supported: HashSet<_> = self.info.features.iter().cloned().collect();
        let negotiated: HashSet<_> = hello
            .features
            .into_iter()
            .filter(|f| supported.contains(f))
            .collect();

        session.complete_handshake(
            hello.protocol_version,
            wire_mode,
            hello.client_name,
            negotiated.clone(),
        );

        let mut features: Vec<_> = negotiated.into_iter().collect();
        features.sort();

        let result = HelloResult {
            protocol_version: PROTOCOL_VERSION,
            wire_mode: wire_mode.as_str().to_string(),
            server_name: self.info.name.clone(),
            server_version: self.info.version.clone(),
            features,
        };

        Ok(serde_json::to_value(result)?)
    }

    fn handle_info(&self) -> Result<Value, ServerError> {
        let result = InfoResult {
            server_name: self.info.name.clone(),
            server_version: self.info.version.clone(),
            protocol_version: PROTOCOL_VERSION,
            features: self.info.features.clone(),
            max_frame_bytes: self.info.max_frame_bytes,
            center_frequency_hz: self.info.center_frequency_hz,
            baud_rates: FlexSpeed::ALL.iter().map(|s| s.bps()).collect(),
            queue_capacity: self.queue.capacity(),
            sink: self.info.sink.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_encode(
        &self,
        session: &mut Session,
        params: &Value,
    ) -> Result<(Value, TransmitReport), ServerError> {
        let p: EncodeParams = serde_json::from_value(params.clone())
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        let mut request = EncodeRequest::new(p.capcode, to_message(p.message)?)
            .with_baud_rate(p.baud_rate)
            .with_extra_capcodes(p.extra_capcodes);
        if let Some(hz) = p.frequency_hz {
            request = request.with_frequency(hz);
        }
        if let Some(cycle_count) = p.cycle_count {
            request = request.with_cycle_count(cycle_count);
        }

        let recipients = request.recipients();
        let report = self.queue.submit(request).await.map_err(|e| {
            warn!("[{}] Page for {} rejected: {}", session.remote_addr, p.capcode, e);
            e
        })?;
        session.record_page();

        let transmission = &report.transmission;
        let address = transmission.address;
        let result = EncodeResult {
            symbols: hex::encode(transmission.symbols.to_packed()),
            symbol_count: transmission.symbols.len(),
            symbol_rate: transmission.symbols.symbol_rate(),
            baud_rate: address.speed.bps(),
            cycle: address.cycle,
            frame: address.frame,
            phase: address.phase.to_string(),
            frame_offset_ms: address.offset_in_hour().num_milliseconds(),
            starts_at: transmission.starts_at,
            recipients,
            retuned: report.retuned(),
            center_frequency_hz: transmission.center_frequency_hz,
            duration_ms: transmission.symbols.duration().as_millis() as u64,
        };

        Ok((serde_json::to_value(result)?, report))
    }
}

/// Converts wire message params into an encoder message.
fn to_message(params: MessageParams) -> Result<Message, ServerError> {
    match (params.kind, params.text) {
        (MessageType::ToneOnly, None) => Ok(Message::ToneOnly),
        (MessageType::ToneOnly, Some(text)) if text.is_empty() => Ok(Message::ToneOnly),
        (MessageType::ToneOnly, Some(_)) => Err(ServerError::InvalidRequest(
            "tone_only messages carry no text".to_string(),
        )),
        (MessageType::Numeric, Some(text)) => Ok(Message::Numeric(text)),
        (MessageType::Alphanumeric, Some(text)) => Ok(Message::Alphanumeric(text)),
        (_, None) => Err(ServerError::InvalidRequest(
            "message text is required".to_string(),
        )),
    }
}

/// Builds the wire error, attaching the offending values for encoder errors.
fn error_response(err: &ServerError) -> ResponseError {
    let error = ResponseError::new(err.error_code(), err.to_string());
    match err {
        ServerError::Encode(EncodeError::InvalidCapcode { capcode }) => {
            error.with_detail("capcode", *capcode)
        }
        ServerError::Encode(EncodeError::MessageTooLong { words, limit }) => error
            .with_detail("words", *words)
            .with_detail("limit", *limit),
        ServerError::Encode(EncodeError::UnsupportedBaudRate { baud_rate }) => {
            error.with_detail("baud_rate", *baud_rate)
        }
        ServerError::Encode(EncodeError::TooManyRecipients { count, limit }) => error
            .with_detail("recipients", *count)
            .with_detail("limit", *limit),
        ServerError::Encode(EncodeError::SlotConflict {
            capcode,
            frame,
            phase,
        }) => error
            .with_detail("capcode", *capcode)
            .with_detail("frame", *frame)
            .with_detail("phase", phase.to_string()),
        ServerError::Busy { capacity } => error.with_detail("queue_capacity", *capacity),
        _ => error,
    }
}
