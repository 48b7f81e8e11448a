//! Shared test helpers.

use crate::sink::{RadioSink, SinkError};
use async_trait::async_trait;
use flexpage_core::{RadioCommand, SymbolStream};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Apply(u64),
    Transmit(usize),
}

/// Records calls; optionally waits for a permit per transmit and fails on demand.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<SinkEvent>>>,
    pub gate: Option<Arc<Semaphore>>,
    pub fail_next: Arc<Mutex<bool>>,
}

impl RecordingSink {
    /// A sink whose transmits block until the returned semaphore gets permits.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        (sink, gate)
    }

    pub fn transmits(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Transmit(_)))
            .count()
    }

    pub fn applied(&self, hz: u64) -> bool {
        self.events.lock().contains(&SinkEvent::Apply(hz))
    }
}

#[async_trait]
impl RadioSink for RecordingSink {
    async fn apply(&mut self, command: &RadioCommand) -> Result<(), SinkError> {
        self.events
            .lock()
            .push(SinkEvent::Apply(command.center_frequency_hz));
        Ok(())
    }

    async fn transmit(&mut self, symbols: &SymbolStream) -> Result<(), SinkError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(SinkError::Rejected("radio offline".into()));
        }
        self.events.lock().push(SinkEvent::Transmit(symbols.len()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
