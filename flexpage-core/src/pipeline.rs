//! Encode pipeline.
//!
//! Turns an [`EncodeRequest`] into a [`Transmission`]: the scheduled frame
//! serialized to symbols plus the radio command needed before emitting it.

use crate::address::Capcode;
use crate::error::EncodeError;
use crate::frame::FlexFrame;
use crate::message::{encode_message, Message};
use crate::scheduler::{schedule, upcoming_cycle_count, FrameAddress};
use crate::speed::FlexSpeed;
use crate::symbols::SymbolStream;
use crate::sync::PREAMBLE_BITS;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Default paging channel (931.3375 MHz).
pub const DEFAULT_CENTER_FREQUENCY_HZ: u64 = 931_337_500;
/// Default resync preamble length.
pub const DEFAULT_PREAMBLE_REPEATS: usize = 35;

/// Immutable encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Channel used when a request does not name one.
    pub center_frequency_hz: u64,
    /// Transmit gain passed through to the radio.
    pub gain_db: f64,
    /// Radio sample rate passed through to the radio.
    pub sample_rate_hz: u32,
    /// Preamble repetitions ahead of sync 1.
    pub preamble_repeats: usize,
    /// Skip the radio command when the channel and symbol rate are unchanged.
    pub retune_memo: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            center_frequency_hz: DEFAULT_CENTER_FREQUENCY_HZ,
            gain_db: 37.0,
            sample_rate_hz: 1_000_000,
            preamble_repeats: DEFAULT_PREAMBLE_REPEATS,
            retune_memo: true,
        }
    }
}

impl EncoderConfig {
    pub fn with_center_frequency(mut self, hz: u64) -> Self {
        self.center_frequency_hz = hz;
        self
    }

    pub fn with_preamble_repeats(mut self, repeats: usize) -> Self {
        self.preamble_repeats = repeats;
        self
    }

    pub fn with_retune_memo(mut self, enabled: bool) -> Self {
        self.retune_memo = enabled;
        self
    }
}

fn default_baud_rate() -> u32 {
    FlexSpeed::default().bps()
}

/// A page to encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub capcode: u32,
    /// Further recipients sharing the message; they must fall in the same
    /// frame and phase as `capcode`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_capcodes: Vec<u32>,
    pub message: Message,
    /// Channel speed in bits per second (1600, 3200 or 6400).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Channel override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<u64>,
    /// Cycle count to schedule into; derived from the clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u64>,
}

impl EncodeRequest {
    pub fn new(capcode: u32, message: Message) -> Self {
        Self {
            capcode,
            extra_capcodes: Vec::new(),
            message,
            baud_rate: default_baud_rate(),
            frequency_hz: None,
            cycle_count: None,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_frequency(mut self, hz: u64) -> Self {
        self.frequency_hz = Some(hz);
        self
    }

    pub fn with_cycle_count(mut self, cycle_count: u64) -> Self {
        self.cycle_count = Some(cycle_count);
        self
    }

    pub fn with_extra_capcodes(mut self, capcodes: impl IntoIterator<Item = u32>) -> Self {
        self.extra_capcodes.extend(capcodes);
        self
    }

    /// Primary capcode first, then the extras, without repeats.
    pub fn recipients(&self) -> Vec<u32> {
        let mut recipients = Vec::with_capacity(1 + self.extra_capcodes.len());
        for capcode in std::iter::once(self.capcode).chain(self.extra_capcodes.iter().copied()) {
            if !recipients.contains(&capcode) {
                recipients.push(capcode);
            }
        }
        recipients
    }
}

/// Radio configuration for a transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioCommand {
    pub center_frequency_hz: u64,
    pub gain_db: f64,
    pub sample_rate_hz: u32,
    pub symbol_rate: u32,
}

/// Output of one encode: symbols plus an optional retune.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub address: FrameAddress,
    /// When the first symbol must leave so sync 1 lands on the frame start.
    pub starts_at: DateTime<Utc>,
    pub symbols: SymbolStream,
    /// Present when the radio must be reconfigured before emitting `symbols`.
    pub command: Option<RadioCommand>,
    pub center_frequency_hz: u64,
}

/// Frame and symbols for a request, before the retune decision.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub frame: FlexFrame,
    pub starts_at: DateTime<Utc>,
    pub symbols: SymbolStream,
    pub radio: RadioCommand,
}

/// Validates requests and produces transmissions.
///
/// Encoding is pure apart from the memo of the last radio configuration.
pub struct FlexEncoder {
    config: EncoderConfig,
    radio_state: Mutex<Option<RadioCommand>>,
}

impl FlexEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            radio_state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Time the preamble takes ahead of sync 1.
    pub fn preamble_lead(&self) -> Duration {
        let bits = (self.config.preamble_repeats * PREAMBLE_BITS) as i64;
        Duration::milliseconds(bits * 1000 / i64::from(FlexSpeed::Bps1600.bps()))
    }

    /// Builds the frame and symbols for a request without touching radio state.
    ///
    /// Without an explicit cycle count the page goes into the next occurrence
    /// of its frame that the preamble can still reach from `now`.
    pub fn prepare(&self, request: &EncodeRequest, now: DateTime<Utc>) -> Result<PreparedFrame> {
        let capcode = Capcode::new(request.capcode)?;
        let speed = FlexSpeed::from_bps(request.baud_rate)?;
        let lead = self.preamble_lead();
        let cycle_count = match request.cycle_count {
            Some(cycle_count) => cycle_count,
            None => upcoming_cycle_count(schedule(capcode, 0, speed).frame, now, lead),
        };
        let address = schedule(capcode, cycle_count, speed);

        let mut recipients = vec![capcode];
        for value in request.recipients().into_iter().skip(1) {
            let other = Capcode::new(value)?;
            let slot = schedule(other, cycle_count, speed);
            if (slot.frame, slot.phase) != (address.frame, address.phase) {
                return Err(EncodeError::SlotConflict {
                    capcode: value,
                    frame: address.frame,
                    phase: address.phase,
                });
            }
            recipients.push(other);
        }

        let message = encode_message(&recipients, &request.message)?;
        let frame = FlexFrame::assemble(address, &recipients, &message).map_err(as_fault)?;
        let symbols =
            SymbolStream::from_frame(&frame, self.config.preamble_repeats).map_err(as_fault)?;

        let radio = RadioCommand {
            center_frequency_hz: request
                .frequency_hz
                .unwrap_or(self.config.center_frequency_hz),
            gain_db: self.config.gain_db,
            sample_rate_hz: self.config.sample_rate_hz,
            symbol_rate: speed.symbol_rate(),
        };

        let starts_at = address.next_start(now) - lead;

        debug!(
            "Prepared page for {} ({} recipients): cycle {} frame {} phase {}, {} symbols, starts {}",
            capcode,
            recipients.len(),
            address.cycle,
            address.frame,
            address.phase,
            symbols.len(),
            starts_at
        );

        Ok(PreparedFrame {
            frame,
            starts_at,
            symbols,
            radio,
        })
    }

    /// Encodes a request scheduled against the current time.
    pub fn encode(&self, request: &EncodeRequest) -> Result<Transmission> {
        self.encode_at(request, Utc::now())
    }

    /// Encodes a request scheduled against `now`.
    pub fn encode_at(&self, request: &EncodeRequest, now: DateTime<Utc>) -> Result<Transmission> {
        let prepared = self.prepare(request, now)?;
        let center_frequency_hz = prepared.radio.center_frequency_hz;
        let command = self.retune(prepared.radio);

        Ok(Transmission {
            address: prepared.frame.address(),
            starts_at: prepared.starts_at,
            symbols: prepared.symbols,
            command,
            center_frequency_hz,
        })
    }

    /// Decides and records the retune under one lock.
    fn retune(&self, target: RadioCommand) -> Option<RadioCommand> {
        let mut last = self.radio_state.lock();
        if self.config.retune_memo && last.as_ref() == Some(&target) {
            return None;
        }
        *last = Some(target.clone());
        Some(target)
    }

    /// Forgets the radio configuration so the next transmission retunes.
    pub fn invalidate_radio_state(&self) {
        *self.radio_state.lock() = None;
    }

    /// Last configuration handed out in a transmission.
    pub fn radio_state(&self) -> Option<RadioCommand> {
        self.radio_state.lock().clone()
    }
}

impl Default for FlexEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

/// Codec argument errors past validation are encoder bugs.
fn as_fault(err: EncodeError) -> EncodeError {
    let err = match err {
        EncodeError::InvalidInput { reason } => EncodeError::EncodingFault { reason },
        other => other,
    };
    if err.is_defect() {
        error!("Encoder defect: {}", err);
    }
    err
}
