//! Integration tests for sensorwatch-core.
//!
//! These exercise the producer/consumer handoff end to end:
//! payload queue → ingest worker → window → render step.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sensorwatch_core::{
    ChartSink, IngestStats, Ingestor, RenderLoop, RenderOutcome, Sample, SampleWindow,
    WindowSnapshot, channel, render_step, spawn_ingest_worker,
};

/// Sink that checks every snapshot it is given for torn samples.
#[derive(Default)]
struct AlignmentChecker {
    renders: usize,
    waits: usize,
    max_len: usize,
}

impl ChartSink for AlignmentChecker {
    fn waiting(&mut self) {
        self.waits += 1;
    }

    fn render(&mut self, snap: &WindowSnapshot) -> io::Result<()> {
        assert_eq!(snap.timestamps.len(), snap.temperatures.len());
        assert_eq!(snap.temperatures.len(), snap.humidities.len());
        for (t, h) in snap.temperatures.iter().zip(&snap.humidities) {
            // Producers always write humidity = 2 * temperature.
            assert_eq!(*h, t * 2.0, "torn sample: t={t} h={h}");
        }
        assert!(snap.timestamps.windows(2).all(|p| p[0] <= p[1]));
        self.renders += 1;
        self.max_len = self.max_len.max(snap.len());
        Ok(())
    }
}

#[test]
fn concurrent_appends_never_tear_snapshots() {
    let cap = 64;
    let window = Arc::new(SampleWindow::new(cap));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let window = Arc::clone(&window);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..20_000 {
                let t = i as f64;
                window.append(Sample::new(t, t * 2.0));
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut sink = AlignmentChecker::default();
    while !done.load(Ordering::SeqCst) {
        render_step(&window, &mut sink);
        assert!(window.len() <= cap);
    }
    writer.join().unwrap();

    assert_eq!(window.len(), cap);
    assert!(sink.max_len <= cap);
    let last = window.latest().unwrap();
    assert_eq!(last.temperature(), 19_999.0);
}

#[test]
fn queue_to_window_preserves_arrival_order() {
    let window = Arc::new(SampleWindow::new(10));
    let stats = Arc::new(IngestStats::new());
    let ingestor = Arc::new(Ingestor::new(Arc::clone(&window), Arc::clone(&stats)));
    let (tx, rx) = channel(256, Arc::clone(&stats));
    let worker = spawn_ingest_worker(rx, ingestor).unwrap();

    for i in 0..25 {
        let payload = format!(r#"{{"temperature": {i}, "humidity": {}, "seq": {i}}}"#, i * 2);
        assert!(tx.offer(payload.into_bytes()));
        if i % 5 == 0 {
            assert!(tx.offer(br#"{"temperature": 1}"#.to_vec()));
        }
    }
    drop(tx);
    worker.join().unwrap();

    let snap = window.snapshot();
    let expected: Vec<f64> = (15..25).map(f64::from).collect();
    assert_eq!(snap.temperatures, expected);

    let s = stats.snapshot();
    assert_eq!(s.accepted, 25);
    assert_eq!(s.incomplete, 5);
    assert_eq!(s.received, 30);
    assert_eq!(s.dropped, 0);
}

#[test]
fn render_loop_sees_data_arriving_in_background() {
    let window = Arc::new(SampleWindow::new(100));
    let stats = Arc::new(IngestStats::new());
    let ingestor = Arc::new(Ingestor::new(Arc::clone(&window), Arc::clone(&stats)));
    let (tx, rx) = channel(16, Arc::clone(&stats));
    let worker = spawn_ingest_worker(rx, ingestor).unwrap();
    let running = Arc::new(AtomicBool::new(true));

    let producer = {
        let running = Arc::clone(&running);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            for i in 0..5 {
                tx.offer(format!(r#"{{"temperature": {i}, "humidity": {}}}"#, i * 2).into_bytes());
                thread::sleep(Duration::from_millis(10));
            }
            thread::sleep(Duration::from_millis(100));
            running.store(false, Ordering::SeqCst);
        })
    };

    let mut sink = AlignmentChecker::default();
    RenderLoop::new(Duration::from_millis(10)).run(&window, &mut sink, &running);
    producer.join().unwrap();
    worker.join().unwrap();

    assert!(sink.waits >= 1, "loop should wait before data arrives");
    assert!(sink.renders >= 1, "loop should render once data arrives");
    assert_eq!(window.len(), 5);
}

#[test]
fn empty_render_is_idempotent() {
    let window = SampleWindow::new(3);
    let mut sink = AlignmentChecker::default();
    for _ in 0..50 {
        assert_eq!(render_step(&window, &mut sink), RenderOutcome::Waiting);
    }
    assert_eq!(sink.waits, 50);
    assert_eq!(sink.renders, 0);
}
