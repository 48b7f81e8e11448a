//! Session management.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Wire mode for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireMode {
    /// Binary framing with JSON payload.
    #[default]
    BinaryJson,
    /// Line-delimited JSON (debug mode).
    Jsonl,
}

impl WireMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireMode::BinaryJson => "binary_json",
            WireMode::Jsonl => "jsonl",
        }
    }

    /// Picks the first mode the server supports, preferring binary framing.
    pub fn negotiate(offered: &[String]) -> Self {
        if offered.iter().any(|m| m == "binary_json") {
            WireMode::BinaryJson
        } else if offered.iter().any(|m| m == "jsonl") {
            WireMode::Jsonl
        } else {
            WireMode::BinaryJson
        }
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state, waiting for HELLO.
    Connected,
    /// Handshake complete, ready for commands.
    Ready,
    /// Session is closing.
    Closing,
}

/// A client session.
pub struct Session {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,
    wire_mode: WireMode,
    protocol_version: u16,
    client_name: Option<String>,
    features: HashSet<String>,

    /// Requests handled so far.
    request_count: u64,
    /// Pages accepted by the transmitter.
    pages_sent: u64,

    created_at: Instant,
    last_activity: Instant,
}

impl Session {
    /// Creates a new session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            state: SessionState::Connected,
            wire_mode: WireMode::default(),
            protocol_version: 0,
            client_name: None,
            features: HashSet::new(),
            request_count: 0,
            pages_sent: 0,
            created_at: Instant::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn wire_mode(&self) -> WireMode {
        self.wire_mode
    }

    pub fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Completes the handshake.
    pub fn complete_handshake(
        &mut self,
        protocol_version: u16,
        wire_mode: WireMode,
        client_name: Option<String>,
        features: HashSet<String>,
    ) {
        self.protocol_version = protocol_version;
        self.wire_mode = wire_mode;
        self.client_name = client_name;
        self.features = features;
        self.state = SessionState::Ready;
    }

    /// Records a request.
    pub fn record_request(&mut self) {
        self.request_count += 1;
        self.last_activity = Instant::now();
    }

    /// Records a page that reached the radio.
    pub fn record_page(&mut self) {
        self.pages_sent += 1;
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn pages_sent(&self) -> u64 {
        self.pages_sent
    }

    /// Returns the time since last activity.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Checks if a feature is enabled.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}
