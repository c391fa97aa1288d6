//! Payload decoding and the ingestion step.
//!
//! The transport's network thread never decodes anything. It offers raw
//! payloads to a bounded queue ([`PayloadSender`]); a single worker thread
//! ([`spawn_ingest_worker`]) drains the queue in arrival order and runs
//! [`Ingestor::handle`] on each payload.
//!
//! `handle` is a containment boundary: malformed or incomplete payloads are
//! logged, counted and discarded. Nothing it does can reach the transport.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::Utf8Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::sample::Sample;
use crate::window::SampleWindow;

/// Payload key holding the temperature reading.
pub const TEMPERATURE_KEY: &str = "temperature";
/// Payload key holding the humidity reading.
pub const HUMIDITY_KEY: &str = "humidity";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Why a payload was not admitted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("field `{0}` is missing or null")]
    MissingField(&'static str),
    #[error("field `{0}` is not a number")]
    NonNumeric(&'static str),
}

impl IngestError {
    /// Missing fields are an incomplete reading; everything else is malformed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}

/// The two values extracted from a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Decode a raw payload into a [`Reading`].
///
/// Expects a UTF-8 JSON object with numeric `temperature` and `humidity`.
/// Other keys are ignored.
pub fn parse_payload(payload: &[u8]) -> Result<Reading, IngestError> {
    let text = std::str::from_utf8(payload)?;
    let value: Value = serde_json::from_str(text)?;
    let obj = value.as_object().ok_or(IngestError::NotAnObject)?;

    let field = |key: &'static str| -> Result<f64, IngestError> {
        match obj.get(key) {
            None | Some(Value::Null) => Err(IngestError::MissingField(key)),
            Some(v) => v.as_f64().ok_or(IngestError::NonNumeric(key)),
        }
    };

    Ok(Reading {
        temperature: field(TEMPERATURE_KEY)?,
        humidity: field(HUMIDITY_KEY)?,
    })
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters shared by the transport, the ingest worker and any reader.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    accepted: AtomicU64,
    malformed: AtomicU64,
    incomplete: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub malformed: u64,
    pub incomplete: u64,
    /// Payloads discarded because the ingest queue was full.
    pub dropped: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Result of handling one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// Undecodable bytes, invalid JSON, or a non-numeric field.
    Malformed,
    /// Valid JSON missing `temperature` or `humidity`.
    Incomplete,
}

/// Turns payloads into samples in the shared window.
pub struct Ingestor {
    window: Arc<SampleWindow>,
    stats: Arc<IngestStats>,
}

impl Ingestor {
    pub fn new(window: Arc<SampleWindow>, stats: Arc<IngestStats>) -> Self {
        Self { window, stats }
    }

    /// Handle one inbound payload. Never fails; rejected payloads are logged.
    pub fn handle(&self, payload: &[u8]) -> IngestOutcome {
        IngestStats::bump(&self.stats.received);
        log::debug!("message received: {}", String::from_utf8_lossy(payload));

        match parse_payload(payload) {
            Ok(reading) => {
                let evicted = self
                    .window
                    .append(Sample::new(reading.temperature, reading.humidity));
                IngestStats::bump(&self.stats.accepted);
                log::trace!(
                    "sample admitted: {:.2} °C, {:.2} %RH ({evicted} evicted)",
                    reading.temperature,
                    reading.humidity
                );
                IngestOutcome::Accepted
            }
            Err(e) if e.is_incomplete() => {
                IngestStats::bump(&self.stats.incomplete);
                log::warn!("discarding incomplete reading: {e}");
                IngestOutcome::Incomplete
            }
            Err(e) => {
                IngestStats::bump(&self.stats.malformed);
                log::warn!("error processing message: {e}");
                IngestOutcome::Malformed
            }
        }
    }

    pub fn window(&self) -> &Arc<SampleWindow> {
        &self.window
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }
}

// ---------------------------------------------------------------------------
// Queue + worker
// ---------------------------------------------------------------------------

/// Producer half of the ingest queue, held by the transport.
#[derive(Clone)]
pub struct PayloadSender {
    tx: SyncSender<Vec<u8>>,
    stats: Arc<IngestStats>,
}

impl PayloadSender {
    /// Offer a payload without blocking.
    ///
    /// Returns `false` when the payload was not queued: either the queue is
    /// full (counted as dropped) or the worker has gone away.
    pub fn offer(&self, payload: Vec<u8>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                IngestStats::bump(&self.stats.dropped);
                log::warn!("ingest queue full, dropping message");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("ingest worker gone, ignoring message");
                false
            }
        }
    }
}

/// Create a bounded ingest queue. A capacity of zero is treated as one.
pub fn channel(capacity: usize, stats: Arc<IngestStats>) -> (PayloadSender, Receiver<Vec<u8>>) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (PayloadSender { tx, stats }, rx)
}

/// Spawn the single ingestion worker.
///
/// The worker handles payloads strictly in queue order and exits once every
/// [`PayloadSender`] has been dropped and the queue is drained.
pub fn spawn_ingest_worker(
    rx: Receiver<Vec<u8>>,
    ingestor: Arc<Ingestor>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sensorwatch-ingest".to_string())
        .spawn(move || {
            while let Ok(payload) = rx.recv() {
                let handled = catch_unwind(AssertUnwindSafe(|| ingestor.handle(&payload)));
                if handled.is_err() {
                    IngestStats::bump(&ingestor.stats.malformed);
                    log::error!("panic while handling message; message discarded");
                }
            }
            log::debug!("ingest worker stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor(cap: usize) -> Ingestor {
        Ingestor::new(
            Arc::new(SampleWindow::new(cap)),
            Arc::new(IngestStats::new()),
        )
    }

    // -----------------------------------------------------------------------
    // parse_payload
    // -----------------------------------------------------------------------

    #[test]
    fn parse_valid_payload() {
        let r = parse_payload(br#"{"temperature": 21.5, "humidity": 60.2}"#).unwrap();
        assert_eq!(r.temperature, 21.5);
        assert_eq!(r.humidity, 60.2);
    }

    #[test]
    fn parse_ignores_extra_keys_and_accepts_integers() {
        let r = parse_payload(br#"{"temperature": 21, "humidity": 60, "rssi": -70}"#).unwrap();
        assert_eq!(r, Reading { temperature: 21.0, humidity: 60.0 });
    }

    #[test]
    fn parse_missing_humidity() {
        let err = parse_payload(br#"{"temperature": 21.5}"#).unwrap_err();
        assert!(matches!(err, IngestError::MissingField("humidity")));
        assert!(err.is_incomplete());
    }

    #[test]
    fn parse_null_temperature_is_missing() {
        let err = parse_payload(br#"{"temperature": null, "humidity": 40}"#).unwrap_err();
        assert!(matches!(err, IngestError::MissingField("temperature")));
    }

    #[test]
    fn parse_not_json() {
        let err = parse_payload(b"not-json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidJson(_)));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn parse_invalid_utf8() {
        let err = parse_payload(&[0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(matches!(err, IngestError::NotUtf8(_)));
    }

    #[test]
    fn parse_array_is_not_an_object() {
        let err = parse_payload(b"[21.5, 60.2]").unwrap_err();
        assert!(matches!(err, IngestError::NotAnObject));
    }

    #[test]
    fn parse_string_value_is_non_numeric() {
        let err = parse_payload(br#"{"temperature": "hot", "humidity": 60}"#).unwrap_err();
        assert!(matches!(err, IngestError::NonNumeric("temperature")));
    }

    // -----------------------------------------------------------------------
    // Ingestor::handle
    // -----------------------------------------------------------------------

    #[test]
    fn valid_payload_appends_one_sample() {
        let ing = ingestor(10);
        let before = ing.window().len();
        let out = ing.handle(br#"{"temperature": 21.5, "humidity": 60.2}"#);
        assert_eq!(out, IngestOutcome::Accepted);
        assert_eq!(ing.window().len(), before + 1);
        let last = ing.window().latest().unwrap();
        assert_eq!(last.temperature(), 21.5);
        assert_eq!(last.humidity(), 60.2);
    }

    #[test]
    fn incomplete_payload_leaves_window_unchanged() {
        let ing = ingestor(10);
        ing.handle(br#"{"temperature": 20, "humidity": 50}"#);
        let out = ing.handle(br#"{"temperature": 21.5}"#);
        assert_eq!(out, IngestOutcome::Incomplete);
        assert_eq!(ing.window().len(), 1);
        assert_eq!(ing.stats().snapshot().incomplete, 1);
    }

    #[test]
    fn malformed_payload_is_recorded_not_raised() {
        let ing = ingestor(10);
        let out = ing.handle(b"not-json");
        assert_eq!(out, IngestOutcome::Malformed);
        assert!(ing.window().is_empty());
        let stats = ing.stats().snapshot();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.received, 1);
        assert_eq!(stats.accepted, 0);
    }

    #[test]
    fn handle_respects_capacity() {
        let ing = ingestor(3);
        for i in 0..10 {
            let payload = format!(r#"{{"temperature": {i}, "humidity": 50}}"#);
            ing.handle(payload.as_bytes());
        }
        let snap = ing.window().snapshot();
        assert_eq!(snap.temperatures, vec![7.0, 8.0, 9.0]);
        assert_eq!(ing.stats().snapshot().accepted, 10);
    }

    // -----------------------------------------------------------------------
    // Queue + worker
    // -----------------------------------------------------------------------

    #[test]
    fn full_queue_drops_and_counts() {
        let stats = Arc::new(IngestStats::new());
        let (tx, _rx) = channel(1, Arc::clone(&stats));
        assert!(tx.offer(b"a".to_vec()));
        assert!(!tx.offer(b"b".to_vec()));
        assert_eq!(stats.snapshot().dropped, 1);
    }

    #[test]
    fn offer_after_worker_gone_is_not_a_drop() {
        let stats = Arc::new(IngestStats::new());
        let (tx, rx) = channel(4, Arc::clone(&stats));
        drop(rx);
        assert!(!tx.offer(b"x".to_vec()));
        assert_eq!(stats.snapshot().dropped, 0);
    }

    #[test]
    fn worker_processes_in_order_and_exits_when_senders_drop() {
        let ing = Arc::new(ingestor(50));
        let (tx, rx) = channel(32, Arc::clone(ing.stats()));
        let handle = spawn_ingest_worker(rx, Arc::clone(&ing)).unwrap();

        for i in 0..20 {
            let payload = format!(r#"{{"temperature": {i}, "humidity": {}}}"#, i * 2);
            assert!(tx.offer(payload.into_bytes()));
        }
        tx.offer(b"garbage".to_vec());
        drop(tx);
        handle.join().unwrap();

        let snap = ing.window().snapshot();
        let expected: Vec<f64> = (0..20).map(f64::from).collect();
        assert_eq!(snap.temperatures, expected);
        assert_eq!(ing.stats().snapshot().malformed, 1);
    }
}
