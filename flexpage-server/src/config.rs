//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via FLEXPAGE_CONFIG)
//! 3. Environment variables

use flexpage_core::pipeline::{DEFAULT_CENTER_FREQUENCY_HZ, DEFAULT_PREAMBLE_REPEATS};
use flexpage_core::EncoderConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Radio front-end settings.
    pub radio: RadioConfig,
    /// Encoder settings.
    pub encoder: EncoderSettings,
    /// Transmit queue and sink.
    pub transmit: TransmitConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FLEXPAGE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.radio.apply_env_overrides();
        self.encoder.apply_env_overrides();
        self.transmit.apply_env_overrides();
    }

    /// Checks settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radio.center_frequency_hz == 0 {
            return Err(ConfigError::ValidationError(
                "radio.center_frequency_hz must be non-zero".to_string(),
            ));
        }
        self.transmit.validate()
    }

    /// Immutable settings handed to the encoder.
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            center_frequency_hz: self.radio.center_frequency_hz,
            gain_db: self.radio.gain_db,
            sample_rate_hz: self.radio.sample_rate_hz,
            preamble_repeats: self.encoder.preamble_repeats,
            retune_memo: self.encoder.retune_memo,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.to_lowercase() == "true")
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], flexpage_protocol::DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 64,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(addr) = env_parse("FLEXPAGE_BIND") {
            self.bind_addr = addr;
        }
        if let Some(secs) = env_parse("FLEXPAGE_IDLE_TIMEOUT") {
            self.idle_timeout_secs = secs;
        }
        if let Some(n) = env_parse("FLEXPAGE_MAX_CONNECTIONS") {
            self.max_connections = n;
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Radio front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Default channel.
    pub center_frequency_hz: u64,
    pub gain_db: f64,
    pub sample_rate_hz: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            center_frequency_hz: DEFAULT_CENTER_FREQUENCY_HZ,
            gain_db: 37.0,
            sample_rate_hz: 1_000_000,
        }
    }
}

impl RadioConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(hz) = env_parse("FLEXPAGE_FREQUENCY") {
            self.center_frequency_hz = hz;
        }
        if let Some(db) = env_parse("FLEXPAGE_GAIN") {
            self.gain_db = db;
        }
        if let Some(rate) = env_parse("FLEXPAGE_SAMPLE_RATE") {
            self.sample_rate_hz = rate;
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Resync preamble repetitions ahead of each frame.
    pub preamble_repeats: usize,
    /// Skip retuning when the radio configuration is unchanged.
    pub retune_memo: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            preamble_repeats: DEFAULT_PREAMBLE_REPEATS,
            retune_memo: true,
        }
    }
}

impl EncoderSettings {
    fn apply_env_overrides(&mut self) {
        if let Some(n) = env_parse("FLEXPAGE_PREAMBLE_REPEATS") {
            self.preamble_repeats = n;
        }
        if let Some(enabled) = env_flag("FLEXPAGE_RETUNE_MEMO") {
            self.retune_memo = enabled;
        }
    }
}

/// Radio sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Log commands and symbol counts only.
    #[default]
    Log,
    /// Append raw symbols to a file.
    File,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Log => "log",
            SinkKind::File => "file",
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(SinkKind::Log),
            "file" => Ok(SinkKind::File),
            other => Err(format!("unknown sink: {}", other)),
        }
    }
}

/// When the transmitter emits a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotTiming {
    /// Hold each page until its preamble must start for the scheduled frame.
    #[default]
    Hold,
    /// Emit as soon as the page is encoded.
    Immediate,
}

impl SlotTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotTiming::Hold => "hold",
            SlotTiming::Immediate => "immediate",
        }
    }
}

impl std::str::FromStr for SlotTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hold" => Ok(SlotTiming::Hold),
            "immediate" => Ok(SlotTiming::Immediate),
            other => Err(format!("unknown slot timing: {}", other)),
        }
    }
}

/// Transmit queue and sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    /// Pages waiting for the transmitter before requests are refused.
    pub queue_capacity: usize,
    pub sink: SinkKind,
    /// Output file for the file sink.
    pub sink_path: Option<PathBuf>,
    pub slot_timing: SlotTiming,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            sink: SinkKind::Log,
            sink_path: None,
            slot_timing: SlotTiming::Hold,
        }
    }
}

impl TransmitConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(n) = env_parse("FLEXPAGE_QUEUE_CAPACITY") {
            self.queue_capacity = n;
        }
        if let Some(kind) = env_parse("FLEXPAGE_SINK") {
            self.sink = kind;
        }
        if let Ok(path) = std::env::var("FLEXPAGE_SINK_PATH") {
            self.sink_path = Some(PathBuf::from(path));
        }
        if let Some(timing) = env_parse("FLEXPAGE_SLOT_TIMING") {
            self.slot_timing = timing;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "transmit.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.sink == SinkKind::File && self.sink_path.is_none() {
            return Err(ConfigError::ValidationError(
                "file sink enabled but transmit.sink_path not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
