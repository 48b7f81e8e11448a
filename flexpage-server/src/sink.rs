//! Radio sinks.
//!
//! A [`RadioSink`] is the boundary between the encoder and whatever drives
//! the FM front end. The transmitter owns exactly one sink and calls it from
//! a single task, so implementations need not be `Sync`.

use crate::config::{SinkKind, TransmitConfig};
use async_trait::async_trait;
use flexpage_core::{RadioCommand, SymbolStream};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Errors raised by a radio sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected request: {0}")]
    Rejected(String),

    #[error("sink not configured: {0}")]
    NotConfigured(String),
}

/// Consumer of radio commands and symbol streams.
#[async_trait]
pub trait RadioSink: Send {
    /// Reconfigures the radio before the next stream.
    async fn apply(&mut self, command: &RadioCommand) -> Result<(), SinkError>;

    /// Emits a symbol stream at its own symbol rate.
    async fn transmit(&mut self, symbols: &SymbolStream) -> Result<(), SinkError>;

    /// Short name for logs and INFO.
    fn name(&self) -> &'static str;
}

/// Sink that only logs what it would send.
#[derive(Debug, Default)]
pub struct LogSink {
    transmissions: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }
}

#[async_trait]
impl RadioSink for LogSink {
    async fn apply(&mut self, command: &RadioCommand) -> Result<(), SinkError> {
        info!(
            "Radio tune: {} Hz, gain {} dB, {} S/s, {} symbols/s",
            command.center_frequency_hz,
            command.gain_db,
            command.sample_rate_hz,
            command.symbol_rate
        );
        Ok(())
    }

    async fn transmit(&mut self, symbols: &SymbolStream) -> Result<(), SinkError> {
        self.transmissions += 1;
        info!(
            "Transmit #{}: {} symbols at {} symbols/s ({:?})",
            self.transmissions,
            symbols.len(),
            symbols.symbol_rate(),
            symbols.duration()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sink that appends raw symbols, one byte each, to a file.
pub struct FileSink {
    path: PathBuf,
    file: File,
    bytes_written: u64,
}

impl FileSink {
    /// Opens (or creates) the output file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let bytes_written = file.metadata().await?.len();
        info!("File sink writing to {}", path.display());
        Ok(Self {
            path,
            file,
            bytes_written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the output file, including data from earlier runs.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[async_trait]
impl RadioSink for FileSink {
    async fn apply(&mut self, command: &RadioCommand) -> Result<(), SinkError> {
        info!(
            "Radio tune: {} Hz at {} symbols/s ({})",
            command.center_frequency_hz,
            command.symbol_rate,
            self.path.display()
        );
        Ok(())
    }

    async fn transmit(&mut self, symbols: &SymbolStream) -> Result<(), SinkError> {
        self.file.write_all(symbols.symbols()).await?;
        self.file.flush().await?;
        self.bytes_written += symbols.len() as u64;
        debug!(
            "Wrote {} symbols to {}",
            symbols.len(),
            self.path.display()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Builds the sink selected by the configuration.
pub async fn open_sink(config: &TransmitConfig) -> Result<Box<dyn RadioSink>, SinkError> {
    match config.sink {
        SinkKind::Log => Ok(Box::new(LogSink::new())),
        SinkKind::File => {
            let path = config.sink_path.as_ref().ok_or_else(|| {
                SinkError::NotConfigured("file sink needs transmit.sink_path".to_string())
            })?;
            Ok(Box::new(FileSink::open(path).await?))
        }
    }
}
