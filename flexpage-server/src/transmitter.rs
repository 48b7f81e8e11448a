//! Transmit queue.
//!
//! Every page goes through one bounded queue into a single task that owns
//! the radio sink. A job is encoded and emitted as a unit (radio command,
//! then symbols), so two pages never interleave on the air.
//!
//! With [`SlotTiming::Hold`] the task waits between the radio command and
//! the symbols until the page's preamble is due, so sync 1 lands on the
//! start of the scheduled frame. Jobs behind it wait too.

use crate::config::SlotTiming;
use crate::error::ServerError;
use crate::sink::RadioSink;
use chrono::Utc;
use flexpage_core::{EncodeRequest, FlexEncoder, Transmission};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a transmitted page.
#[derive(Debug, Clone)]
pub struct TransmitReport {
    pub transmission: Transmission,
    /// Time spent waiting in the queue.
    pub queued: Duration,
    /// Time held back for the frame slot after encoding.
    pub held: Duration,
}

impl TransmitReport {
    /// Whether a radio command went out ahead of the symbols.
    pub fn retuned(&self) -> bool {
        self.transmission.command.is_some()
    }
}

type Reply = oneshot::Sender<Result<TransmitReport, ServerError>>;

struct TransmitJob {
    request: EncodeRequest,
    reply: Reply,
    enqueued_at: Instant,
}

/// Handle for submitting pages to the transmitter task.
#[derive(Clone)]
pub struct TransmitQueue {
    tx: mpsc::Sender<TransmitJob>,
    capacity: usize,
}

impl TransmitQueue {
    /// Spawns the transmitter task.
    ///
    /// The task exits once every queue handle has been dropped.
    pub fn spawn(
        encoder: Arc<FlexEncoder>,
        sink: Box<dyn RadioSink>,
        capacity: usize,
        timing: SlotTiming,
    ) -> (Self, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(run(encoder, sink, rx, timing));
        (Self { tx, capacity }, handle)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs queued but not yet picked up by the transmitter.
    pub fn pending(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Queues a page without waiting for it.
    ///
    /// Fails with `Busy` when the queue is full. Dropping the receiver
    /// before the transmitter reaches the job cancels it.
    pub fn enqueue(
        &self,
        request: EncodeRequest,
    ) -> Result<oneshot::Receiver<Result<TransmitReport, ServerError>>, ServerError> {
        let (reply, rx) = oneshot::channel();
        let job = TransmitJob {
            request,
            reply,
            enqueued_at: Instant::now(),
        };
        match self.tx.try_send(job) {
            Ok(()) => Ok(rx),
            Err(TrySendError::Full(job)) => {
                warn!(
                    "Transmit queue full, rejecting page for {}",
                    job.request.capcode
                );
                Err(ServerError::Busy {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(ServerError::ShuttingDown),
        }
    }

    /// Queues a page and waits until it has been emitted.
    pub async fn submit(&self, request: EncodeRequest) -> Result<TransmitReport, ServerError> {
        let rx = self.enqueue(request)?;
        rx.await.map_err(|_| ServerError::ShuttingDown)?
    }
}

async fn run(
    encoder: Arc<FlexEncoder>,
    mut sink: Box<dyn RadioSink>,
    mut rx: mpsc::Receiver<TransmitJob>,
    timing: SlotTiming,
) {
    info!(
        "Transmitter started (sink: {}, slot timing: {})",
        sink.name(),
        timing.as_str()
    );

    while let Some(mut job) = rx.recv().await {
        if job.reply.is_closed() {
            warn!(
                "Dropping page for {}: requester went away",
                job.request.capcode
            );
            continue;
        }

        let queued = job.enqueued_at.elapsed();
        let result = emit(&encoder, sink.as_mut(), &job.request, timing, &mut job.reply).await;
        let result = match result {
            Ok(Some((transmission, held))) => Ok(TransmitReport {
                transmission,
                queued,
                held,
            }),
            Ok(None) => {
                warn!(
                    "Dropping page for {}: requester went away before its slot",
                    job.request.capcode
                );
                continue;
            }
            Err(e) => Err(e),
        };
        if job.reply.send(result).is_err() {
            debug!("Requester for {} left before the reply", job.request.capcode);
        }
    }

    info!("Transmitter stopped");
}

/// Waits until `transmission` is due, or returns `None` once the requester
/// is gone.
async fn hold(transmission: &Transmission, reply: &mut Reply) -> Option<Duration> {
    let wait = (transmission.starts_at - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    if !wait.is_zero() {
        debug!(
            "Holding page for frame {} cycle {} for {} ms",
            transmission.address.frame,
            transmission.address.cycle,
            wait.as_millis()
        );
    }

    let started = tokio::time::Instant::now();
    tokio::select! {
        _ = tokio::time::sleep(wait) => Some(started.elapsed()),
        _ = reply.closed() => None,
    }
}

/// Encodes one page and hands it to the sink once its slot is due.
///
/// Returns `None` when the requester left while the page was held.
async fn emit(
    encoder: &FlexEncoder,
    sink: &mut dyn RadioSink,
    request: &EncodeRequest,
    timing: SlotTiming,
    reply: &mut Reply,
) -> Result<Option<(Transmission, Duration)>, ServerError> {
    let transmission = encoder.encode(request)?;

    if let Some(command) = &transmission.command {
        if let Err(e) = sink.apply(command).await {
            encoder.invalidate_radio_state();
            error!("Radio sink failed to apply command: {}", e);
            return Err(e.into());
        }
    }

    let held = match timing {
        SlotTiming::Immediate => Duration::ZERO,
        SlotTiming::Hold => match hold(&transmission, reply).await {
            Some(held) => held,
            None => return Ok(None),
        },
    };

    if let Err(e) = sink.transmit(&transmission.symbols).await {
        encoder.invalidate_radio_state();
        error!("Radio sink failed to transmit: {}", e);
        return Err(e.into());
    }

    debug!(
        "Emitted page for {} in frame {} cycle {}",
        request.capcode, transmission.address.frame, transmission.address.cycle
    );
    Ok(Some((transmission, held)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingSink, SinkEvent};
    use chrono::Timelike;
    use flexpage_core::{EncoderConfig, Message};

    fn page(capcode: u32) -> EncodeRequest {
        EncodeRequest::new(capcode, Message::Alphanumeric("TEST".into())).with_cycle_count(0)
    }

    fn spawn(sink: RecordingSink, capacity: usize) -> TransmitQueue {
        let encoder = Arc::new(FlexEncoder::new(EncoderConfig::default()));
        TransmitQueue::spawn(encoder, Box::new(sink), capacity, SlotTiming::Immediate).0
    }

    fn spawn_holding(sink: RecordingSink) -> TransmitQueue {
        let encoder = Arc::new(FlexEncoder::new(
            EncoderConfig::default().with_preamble_repeats(2),
        ));
        TransmitQueue::spawn(encoder, Box::new(sink), 4, SlotTiming::Hold).0
    }

    /// Capcode whose frame starts `frames` frames from now.
    fn capcode_frames_ahead(frames: u32) -> u32 {
        let now = Utc::now();
        let ms_in_cycle =
            (now.minute() % 4) * 60_000 + now.second() * 1000 + now.timestamp_subsec_millis();
        let current = ms_in_cycle / 1875;
        128 + (current + frames) % 128
    }

    #[tokio::test]
    async fn test_command_then_symbols() {
        let sink = RecordingSink::default();
        let queue = spawn(sink.clone(), 4);

        let first = queue.submit(page(425321)).await.unwrap();
        assert!(first.retuned());
        assert_eq!(first.held, Duration::ZERO);
        let second = queue.submit(page(425322)).await.unwrap();
        assert!(!second.retuned());

        let events = sink.events.lock().clone();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], SinkEvent::Apply(931_337_500));
        assert!(matches!(events[1], SinkEvent::Transmit(n) if n == first.transmission.symbols.len()));
        assert!(matches!(events[2], SinkEvent::Transmit(_)));
    }

    #[tokio::test]
    async fn test_frequency_change_retunes() {
        let sink = RecordingSink::default();
        let queue = spawn(sink.clone(), 4);

        queue.submit(page(1)).await.unwrap();
        let report = queue
            .submit(page(1).with_frequency(929_612_500))
            .await
            .unwrap();
        assert!(report.retuned());
        assert_eq!(report.transmission.center_frequency_hz, 929_612_500);
        assert_eq!(sink.events.lock()[2], SinkEvent::Apply(929_612_500));
    }

    #[tokio::test]
    async fn test_encode_error_reaches_requester() {
        let sink = RecordingSink::default();
        let queue = spawn(sink.clone(), 4);

        let err = queue
            .submit(page(1).with_baud_rate(9600))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_code(),
            flexpage_protocol::ErrorCode::UnsupportedBaudRate
        );
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_forces_retune() {
        let sink = RecordingSink::default();
        let queue = spawn(sink.clone(), 4);

        queue.submit(page(1)).await.unwrap();
        *sink.fail_next.lock() = true;
        let err = queue.submit(page(1)).await.unwrap_err();
        assert!(err.is_retryable());

        // the failed job skipped the command; the next one must send it again
        let report = queue.submit(page(1)).await.unwrap();
        assert!(report.retuned());
    }

    #[tokio::test]
    async fn test_full_queue_is_busy() {
        let (sink, gate) = RecordingSink::gated();
        let queue = spawn(sink.clone(), 1);

        let first = queue.enqueue(page(1)).unwrap();
        // wait until the transmitter holds the first job
        while !sink.applied(931_337_500) {
            tokio::task::yield_now().await;
        }
        let second = queue.enqueue(page(2)).unwrap();
        assert_eq!(queue.pending(), 1);
        let third = queue.enqueue(page(3));
        assert!(matches!(third, Err(ServerError::Busy { capacity: 1 })));

        gate.add_permits(2);
        tokio_test::assert_ok!(first.await.unwrap());
        tokio_test::assert_ok!(second.await.unwrap());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_job_is_skipped() {
        let (sink, gate) = RecordingSink::gated();
        let queue = spawn(sink.clone(), 4);

        let first = queue.enqueue(page(1)).unwrap();
        let abandoned = queue.enqueue(page(2)).unwrap();
        drop(abandoned);

        gate.add_permits(3);
        first.await.unwrap().unwrap();
        queue.submit(page(3)).await.unwrap();
        assert_eq!(sink.transmits(), 2);
    }

    #[tokio::test]
    async fn test_queue_closed_after_task_ends() {
        let encoder = Arc::new(FlexEncoder::default());
        let (queue, handle) = TransmitQueue::spawn(
            encoder,
            Box::new(RecordingSink::default()),
            2,
            SlotTiming::Immediate,
        );
        handle.abort();
        let _ = handle.await;

        let result = queue.submit(page(1)).await;
        assert!(matches!(result, Err(ServerError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_until_slot() {
        let sink = RecordingSink::default();
        let queue = spawn_holding(sink.clone());

        let capcode = capcode_frames_ahead(20);
        let request = EncodeRequest::new(capcode, Message::Alphanumeric("ON TIME".into()));
        let report = queue.submit(request).await.unwrap();

        // 20 frames of 1.875 s, less the partial current frame and preamble
        assert!(report.held >= Duration::from_secs(30), "{:?}", report.held);
        assert!(report.held <= Duration::from_secs(38), "{:?}", report.held);
        assert_eq!(u32::from(report.transmission.address.frame), capcode % 128);
        assert!(report.transmission.starts_at > Utc::now() - chrono::Duration::seconds(1));
        assert_eq!(sink.transmits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_held() {
        let sink = RecordingSink::default();
        let queue = spawn_holding(sink.clone());

        let capcode = capcode_frames_ahead(20);
        let held = queue
            .enqueue(EncodeRequest::new(capcode, Message::ToneOnly))
            .unwrap();
        while !sink.applied(931_337_500) {
            tokio::task::yield_now().await;
        }
        drop(held);

        // only the second page reaches the air
        let next = queue
            .submit(EncodeRequest::new(capcode, Message::ToneOnly))
            .await;
        assert!(next.is_ok());
        assert_eq!(sink.transmits(), 1);
    }
}
